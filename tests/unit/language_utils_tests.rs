/*!
 * Tests for locale normalization and language lookups
 */

use backoffice::language_utils::{
    LanguageCodeType, get_language_name, locales_match, normalize_locale, primary_subtag, validate_language_code,
    validate_locale,
};

#[test]
fn test_normalizeLocale_withMixedCase_shouldLowercaseAndHyphenate() {
    assert_eq!(normalize_locale(" pt_BR "), "pt-br");
    assert_eq!(normalize_locale("FR"), "fr");
    assert_eq!(normalize_locale("   "), "");
}

#[test]
fn test_primarySubtag_shouldReturnLanguagePart() {
    assert_eq!(primary_subtag("pt-br"), "pt");
    assert_eq!(primary_subtag("zh_Hant"), "zh");
    assert_eq!(primary_subtag("es"), "es");
}

#[test]
fn test_localesMatch_shouldIgnoreCaseAndSeparator() {
    assert!(locales_match("pt_BR", "pt-br"));
    assert!(locales_match(" es ", "ES"));
    assert!(!locales_match("pt-br", "pt"));
}

#[test]
fn test_validateLocale_withUnknownLanguage_shouldFail() {
    assert_eq!(validate_locale("ES").unwrap(), "es");
    assert!(validate_locale("").is_err());
    assert!(validate_locale("zz-top").is_err());
}

#[test]
fn test_validateLanguageCode_withPart2Codes_shouldClassify() {
    assert_eq!(validate_language_code("fr").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("fra").unwrap(), LanguageCodeType::Part2T);
    assert_eq!(validate_language_code("fre").unwrap(), LanguageCodeType::Part2B);
}

#[test]
fn test_getLanguageName_shouldReturnEnglishName() {
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert_eq!(get_language_name("es-MX").unwrap(), "Spanish");
    assert!(get_language_name("qq").is_err());
}
