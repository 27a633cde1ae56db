use shelfkeeper::extract::artist::{normalize, NormalizeResult};

#[test]
fn scene_release_noise_is_stripped_down_to_the_artist() {
    let result = normalize("[AFT023] Atom Heart - Pure Funktion -Dew-");
    assert_eq!(result, NormalizeResult::Valid("Atom Heart".into()));
}

#[test]
fn catalog_prefixed_alias_and_scene_tail_both_resolve_through_full_pipeline() {
    let aliased = normalize("Atom Heart aka Uwe Schmidt [256K]");
    assert_eq!(aliased, NormalizeResult::Valid("Atom Heart".into()));
}

#[test]
fn invalid_shapes_are_rejected_end_to_end() {
    for raw in ["1994", "null", "xy"] {
        assert_eq!(normalize(raw), NormalizeResult::Invalid, "expected {raw:?} to be invalid");
    }
}
