use super::Language;

#[test]
fn it_resolves_known_codes() {
    assert_eq!(Language::resolve("en").to_string(), "English");
    assert_eq!(Language::resolve("hi").to_string(), "Hindi");
    assert_eq!(Language::resolve("ta").to_string(), "Tamil");
    assert_eq!(Language::resolve("te").to_string(), "Telugu");
    assert_eq!(Language::resolve("bn").to_string(), "Bengali");
}

#[test]
fn it_falls_back_to_english() {
    assert_eq!(Language::resolve("xx"), Language::English);
    assert_eq!(Language::resolve(""), Language::English);
    assert_eq!(Language::resolve("TA"), Language::English);
    assert_eq!(Language::resolve("Tamil"), Language::English);
}

#[test]
fn it_round_trips_codes() {
    for lang in [
        Language::English,
        Language::Hindi,
        Language::Tamil,
        Language::Telugu,
        Language::Bengali,
    ] {
        assert_eq!(Language::resolve(lang.code()), lang);
    }
}
