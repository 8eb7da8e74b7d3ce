use crate::WhoisRecord;
use once_cell::sync::Lazy;
use regex::Regex;

/// Label spellings vary across registry dialects (RIPE-style `origin:`,
/// ARIN-style `OriginAS:`, route objects' `aut-num:`). Each field gets an
/// ordered pattern list; the first pattern that matches anywhere wins.
/// Extending to a new dialect is a one-line addition here.
const ASN_PATTERNS: &[&str] = &[
    r"(?i)origin:\s*([\w-]+)",
    r"(?i)OriginAS:\s*([\w-]+)",
    r"(?i)aut-num:\s*([\w-]+)",
];

const NAME_PATTERNS: &[&str] = &[
    r"(?i)netname:\s*([\w-]+)",
    r"(?i)descr:\s*([\w-]+)",
];

const COUNTRY_PATTERNS: &[&str] = &[
    r"(?i)country:\s*([A-Za-z]{2})\b",
];

static ASN_TABLE: Lazy<Vec<Regex>> = Lazy::new(|| compile(ASN_PATTERNS));
static NAME_TABLE: Lazy<Vec<Regex>> = Lazy::new(|| compile(NAME_PATTERNS));
static COUNTRY_TABLE: Lazy<Vec<Regex>> = Lazy::new(|| compile(COUNTRY_PATTERNS));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("extraction pattern is valid"))
        .collect()
}

/// First-match-wins over an ordered pattern list, first capture group trimmed.
fn first_match(table: &[Regex], text: &str) -> Option<String> {
    table
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Extract ASN, network name and country code from raw whois text.
///
/// This is a best-effort heuristic over free text, not a parser of a formal
/// grammar: fields that no pattern matches stay absent, and no cross-field
/// validation is performed.
pub fn extract(text: &str) -> WhoisRecord {
    WhoisRecord {
        asn: first_match(&ASN_TABLE, text),
        name: first_match(&NAME_TABLE, text),
        country: first_match(&COUNTRY_TABLE, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ripe_style_response() {
        let text = "origin: AS64500\ndescr: Example Network\ncountry: DE";
        let record = extract(text);

        assert_eq!(record.asn.as_deref(), Some("AS64500"));
        // descr captures the first word-class token only
        assert_eq!(record.name.as_deref(), Some("Example"));
        assert_eq!(record.country.as_deref(), Some("DE"));
        assert!(record.is_complete());
    }

    #[test]
    fn netname_takes_precedence_over_descr() {
        let text = "descr: SomeProvider\nnetname: EXAMPLE-NET\ncountry: NL";
        let record = extract(text);
        assert_eq!(record.name.as_deref(), Some("EXAMPLE-NET"));
    }

    #[test]
    fn arin_style_labels_match() {
        let text = "OriginAS: AS15169\nNetName: GOOGLE\nCountry: US";
        let record = extract(text);

        assert_eq!(record.asn.as_deref(), Some("AS15169"));
        assert_eq!(record.name.as_deref(), Some("GOOGLE"));
        assert_eq!(record.country.as_deref(), Some("US"));
    }

    #[test]
    fn aut_num_is_the_last_asn_fallback() {
        let text = "aut-num: AS3333\ncountry: NL";
        let record = extract(text);
        assert_eq!(record.asn.as_deref(), Some("AS3333"));
        assert!(record.name.is_none());
        assert!(!record.is_complete());
    }

    #[test]
    fn unmatched_fields_stay_absent() {
        let record = extract("% no entries found");
        assert!(record.asn.is_none());
        assert!(record.name.is_none());
        assert!(record.country.is_none());
        assert!(!record.is_complete());
    }

    #[test]
    fn labels_match_case_insensitively() {
        let text = "ORIGIN: as64500\nNETNAME: TEST-NET\nCOUNTRY: de";
        let record = extract(text);
        assert_eq!(record.asn.as_deref(), Some("as64500"));
        assert_eq!(record.country.as_deref(), Some("de"));
    }
}
