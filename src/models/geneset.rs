//! Geneset models.

use serde::{Deserialize, Serialize};

use super::RawAnnotation;

/// Maximum length of a geneset slug.
pub const SLUG_MAX_LENGTH: usize = 75;

/// A named, organism-scoped, user-owned gene collection with history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Geneset {
    pub id: String,
    pub creator: String,
    pub title: String,
    pub slug: String,
    pub organism_id: i64,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub public: bool,
    /// Soft-delete flag; the row is kept so forks keep their lineage
    pub deleted: bool,
    /// Source geneset this one was forked from, informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Distinct genes in the most recently committed version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_item_count: Option<i64>,
    pub created_at: String,
}

/// Request body for creating a new geneset.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateGenesetRequest {
    pub title: String,
    /// Derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    pub organism_id: i64,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional contents of a first version
    #[serde(default)]
    pub annotations: Option<Vec<RawAnnotation>>,
    /// Identifier kind of the annotation gene tokens
    #[serde(default)]
    pub xrdb: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for updating an existing geneset. Slugs never change.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGenesetRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// Absent keeps the current abstract. A blank string clears it.
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Request body for forking a geneset into a new one.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ForkRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Fork as of this version hash instead of the tip
    #[serde(default)]
    pub fork_version: Option<String>,
}

/// URL-safe label: lowercase ASCII alphanumerics with runs of anything else
/// collapsed to a single `-`, trimmed and cut to `max_len` characters.
/// Accented Latin letters are folded to their base letters first.
pub fn slugify(title: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        let folded = if c.is_ascii_alphanumeric() {
            Some(c.to_string())
        } else {
            fold_latin(c).map(str::to_string)
        };
        match folded {
            Some(letters) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(&letters.to_ascii_lowercase());
            }
            None => pending_dash = true,
        }
    }
    slug.truncate(max_len);
    slug.trim_end_matches('-').to_string()
}

/// ASCII spelling of a Latin-1 or Latin Extended-A letter.
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' | 'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "c",
        'ď' | 'đ' | 'Ď' | 'Đ' | 'ð' | 'Ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' | 'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "g",
        'ĥ' | 'ħ' | 'Ĥ' | 'Ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "i",
        'ĵ' | 'Ĵ' => "j",
        'ķ' | 'Ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' | 'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'Ñ' | 'Ń' | 'Ņ' | 'Ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "o",
        'œ' | 'Œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' | 'Ŕ' | 'Ŗ' | 'Ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'Ś' | 'Ŝ' | 'Ş' | 'Š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' | 'Ţ' | 'Ť' | 'Ŧ' => "t",
        'þ' | 'Þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "u",
        'ŵ' | 'Ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' | 'Ý' | 'Ÿ' | 'Ŷ' => "y",
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Whether `slug` could have been produced by [`slugify`].
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= SLUG_MAX_LENGTH
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_punctuation() {
        assert_eq!(
            slugify("  DNA damage -- repair (human)! ", SLUG_MAX_LENGTH),
            "dna-damage-repair-human"
        );
        assert_eq!(slugify("Test RNA polymerase II geneset", SLUG_MAX_LENGTH), "test-rna-polymerase-ii-geneset");
        assert_eq!(slugify("!!!", SLUG_MAX_LENGTH), "");
    }

    #[test]
    fn test_slugify_folds_accented_letters() {
        assert_eq!(slugify("Gène réparation", SLUG_MAX_LENGTH), "gene-reparation");
        assert_eq!(slugify("Straße Æther Ñandú", SLUG_MAX_LENGTH), "strasse-aether-nandu");
        assert_eq!(slugify("DNA 修復 repair", SLUG_MAX_LENGTH), "dna-repair");
        assert_eq!(slugify("遺伝子", SLUG_MAX_LENGTH), "");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_dash() {
        let title = format!("{} tail", "a".repeat(74));
        let slug = slugify(&title, SLUG_MAX_LENGTH);
        assert_eq!(slug, "a".repeat(74));

        // Titles differing only past the cut share a slug
        let a = format!("{}{}", "b".repeat(80), "one");
        let b = format!("{}{}", "b".repeat(80), "two");
        assert_eq!(slugify(&a, SLUG_MAX_LENGTH), slugify(&b, SLUG_MAX_LENGTH));
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("dna-repair-2"));
        assert!(!is_valid_slug("DNA-repair"));
        assert!(!is_valid_slug("-repair"));
        assert!(!is_valid_slug("dna--repair"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug(&"a".repeat(76)));
    }
}
