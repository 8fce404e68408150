//! Structured extractor
//!
//! Turns the generator's markdown answer into a [`RecommendationRecord`].
//!
//! # Algorithm
//!
//! 1. [`split_sections`] walks the text line by line. A heading is a line
//!    whose trimmed form starts with `#` characters followed by whitespace or
//!    end of line. A heading whose title starts with a known header opens that
//!    section the first time it is seen, and text after the header on the same
//!    line starts its body. Any other heading (unknown, or a repeat) closes the
//!    open section. Other lines go to the open section.
//! 2. Each section is parsed independently into `Result<_, ParseIssue>`.
//! 3. Failed sections fall back to fixed content. The chemical section falls
//!    back to the [`PesticideLookup`] entry when one exists.
//!
//! Extraction never fails; the returned [`Extraction`] always holds a complete
//! record plus the list of degraded sections.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use super::pesticide_lookup::{display_name, PesticideLookup, NOT_AVAILABLE};
use crate::models::{ChemicalSolution, RecommendationRecord};

/// `pest_info` when the section is missing or empty
pub const INFO_FALLBACK: &str = "Information not available.";

/// Dosage placeholder; no dosage is ever derived from generated text
pub const DOSAGE_PLACEHOLDER: &str = "As per local guidelines";

/// Note for chemical entries without one
pub const DEFAULT_CHEMICAL_NOTE: &str = "Consult packaging for detailed information.";

const DISCLAIMER_MARKER: &str = "CRITICAL DISCLAIMER";

/// The four sections of a generated recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    PestInfo,
    IpmSolutions,
    ChemicalSolutions,
    PreventionTips,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::PestInfo,
        Section::IpmSolutions,
        Section::ChemicalSolutions,
        Section::PreventionTips,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Section::PestInfo => "PEST INFO",
            Section::IpmSolutions => "IPM SOLUTIONS",
            Section::ChemicalSolutions => "CHEMICAL SOLUTIONS",
            Section::PreventionTips => "PREVENTION TIPS",
        }
    }

    /// Section named by a heading title, plus any text following the header
    ///
    /// Matching is ASCII case-insensitive on the title prefix, so
    /// `"Pest Info: Larvae bore into bolls"` yields
    /// `(PestInfo, "Larvae bore into bolls")`. The rest of a longer heading
    /// word (`"Pest Information"`) is not body text.
    pub fn from_title(title: &str) -> Option<(Section, &str)> {
        Self::ALL.into_iter().find_map(|section| {
            let header = section.header();
            let prefix = title.get(..header.len())?;
            if !prefix.eq_ignore_ascii_case(header) {
                return None;
            }
            let rest = title[header.len()..]
                .trim_start_matches(|c: char| c.is_alphanumeric())
                .trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            Some((section, rest))
        })
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Raw body text per section; absent sections read as empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionedText {
    bodies: [Option<String>; 4],
}

impl SectionedText {
    pub fn get(&self, section: Section) -> &str {
        self.bodies[section.slot()].as_deref().unwrap_or("")
    }

    /// Whether the heading for `section` appeared at all
    pub fn contains(&self, section: Section) -> bool {
        self.bodies[section.slot()].is_some()
    }
}

/// Why a section fell back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseIssue {
    #[error("heading missing")]
    Missing,

    #[error("section empty")]
    Empty,

    #[error("no usable entries")]
    NoEntries,
}

/// Extractor output
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: RecommendationRecord,
    /// Sections that fell back, in section order
    pub issues: Vec<(Section, ParseIssue)>,
    /// The chemical list came from the lookup table
    pub used_lookup_fallback: bool,
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Title of a heading line, or `None` when the line is not a heading
///
/// Markup (`*`, `_`, backticks, trailing `#` and `:`) is stripped from the title.
pub fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let rest = trimmed.trim_start_matches('#');
    if rest.len() == trimmed.len() {
        return None;
    }
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let title: String = rest
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`'))
        .collect();
    Some(
        title
            .trim()
            .trim_end_matches(|c: char| c == '#' || c == ':' || c.is_whitespace())
            .to_string(),
    )
}

/// Split generated text into its four sections
pub fn split_sections(text: &str) -> SectionedText {
    let mut sections = SectionedText::default();
    let mut open: Option<Section> = None;

    for line in text.lines() {
        if let Some(title) = heading_title(line) {
            open = match Section::from_title(&title) {
                Some((section, inline)) if !sections.contains(section) => {
                    let mut body = String::new();
                    if !inline.is_empty() {
                        body.push_str(inline);
                        body.push('\n');
                    }
                    sections.bodies[section.slot()] = Some(body);
                    Some(section)
                }
                Some((section, _)) => {
                    debug!(section = %section, "Repeated heading closes section");
                    None
                }
                None => None,
            };
            continue;
        }

        if let Some(section) = open {
            if let Some(body) = sections.bodies[section.slot()].as_mut() {
                body.push_str(line);
                body.push('\n');
            }
        }
    }

    sections
}

/// Strip bullet markers and emphasis markup from one line
///
/// A bullet is `-`, `*` or `+` followed by whitespace; `*Bt*` is emphasis,
/// not a bullet.
pub fn clean_line(line: &str) -> String {
    let mut rest = line.trim();
    while let Some(after) = strip_bullet(rest) {
        rest = after;
    }
    rest.replace('*', "").trim().to_string()
}

fn strip_bullet(text: &str) -> Option<&str> {
    let after = text.strip_prefix(|c: char| matches!(c, '-' | '*' | '+'))?;
    if after.is_empty() || after.starts_with(char::is_whitespace) {
        Some(after.trim_start())
    } else {
        None
    }
}

fn section_body(sections: &SectionedText, section: Section) -> Result<&str, ParseIssue> {
    if !sections.contains(section) {
        return Err(ParseIssue::Missing);
    }
    let body = sections.get(section).trim();
    if body.is_empty() {
        return Err(ParseIssue::Empty);
    }
    Ok(body)
}

pub fn parse_info(body: &str) -> Result<String, ParseIssue> {
    let info = body.trim();
    if info.is_empty() {
        return Err(ParseIssue::Empty);
    }
    Ok(info.to_string())
}

/// Bulleted list → cleaned, non-empty entries
pub fn parse_tip_list(body: &str) -> Result<Vec<String>, ParseIssue> {
    let items: Vec<String> = body
        .lines()
        .map(clean_line)
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Err(ParseIssue::NoEntries);
    }
    Ok(items)
}

/// One chemical entry, or `None` for disclaimers and lines without a name
pub fn parse_chemical_line(line: &str) -> Option<ChemicalSolution> {
    if line.to_uppercase().contains(DISCLAIMER_MARKER) {
        return None;
    }

    let cleaned = clean_line(line);
    let (pesticide, notes) = match cleaned.split_once(':') {
        Some((name, note)) => (name.trim(), note.trim()),
        None => (cleaned.as_str(), ""),
    };
    if pesticide.is_empty() {
        return None;
    }

    Some(ChemicalSolution {
        pesticide: pesticide.to_string(),
        dosage: DOSAGE_PLACEHOLDER.to_string(),
        notes: if notes.is_empty() {
            DEFAULT_CHEMICAL_NOTE.to_string()
        } else {
            notes.to_string()
        },
    })
}

pub fn parse_chemical_list(body: &str) -> Result<Vec<ChemicalSolution>, ParseIssue> {
    let entries: Vec<ChemicalSolution> = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_chemical_line)
        .collect();

    if entries.is_empty() {
        return Err(ParseIssue::NoEntries);
    }
    Ok(entries)
}

fn settle<T>(
    issues: &mut Vec<(Section, ParseIssue)>,
    section: Section,
    result: Result<T, ParseIssue>,
    fallback: T,
) -> T {
    result.unwrap_or_else(|issue| {
        issues.push((section, issue));
        fallback
    })
}

/// Build a complete record from generated `text`
///
/// `pest_name` is the name as requested; the record carries its title-cased
/// display form.
pub fn extract_recommendation(
    pest_name: &str,
    text: &str,
    lookup: &PesticideLookup,
) -> Extraction {
    let sections = split_sections(text);
    let mut issues = Vec::new();

    let pest_info = settle(
        &mut issues,
        Section::PestInfo,
        section_body(&sections, Section::PestInfo).and_then(parse_info),
        INFO_FALLBACK.to_string(),
    );
    let ipm_solutions = settle(
        &mut issues,
        Section::IpmSolutions,
        section_body(&sections, Section::IpmSolutions).and_then(parse_tip_list),
        Vec::new(),
    );
    let prevention_tips = settle(
        &mut issues,
        Section::PreventionTips,
        section_body(&sections, Section::PreventionTips).and_then(parse_tip_list),
        Vec::new(),
    );

    let mut used_lookup_fallback = false;
    let chemical_solutions = match section_body(&sections, Section::ChemicalSolutions)
        .and_then(parse_chemical_list)
    {
        Ok(entries) => entries,
        Err(issue) => {
            issues.push((Section::ChemicalSolutions, issue));
            match lookup.lookup(pest_name) {
                NOT_AVAILABLE => Vec::new(),
                pesticide => {
                    used_lookup_fallback = true;
                    vec![ChemicalSolution {
                        pesticide: pesticide.to_string(),
                        dosage: DOSAGE_PLACEHOLDER.to_string(),
                        notes: DEFAULT_CHEMICAL_NOTE.to_string(),
                    }]
                }
            }
        }
    };

    // Keep section order regardless of parse order
    issues.sort_by_key(|(section, _)| section.slot());

    if !issues.is_empty() {
        let degraded = issues
            .iter()
            .map(|(section, issue)| format!("{} ({})", section, issue))
            .collect::<Vec<_>>()
            .join(", ");
        warn!(
            pest = %pest_name,
            used_lookup_fallback,
            "Recommendation degraded: {}",
            degraded
        );
    }

    Extraction {
        record: RecommendationRecord {
            pest_name: display_name(pest_name),
            pest_info,
            ipm_solutions,
            chemical_solutions,
            prevention_tips,
        },
        issues,
        used_lookup_fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "\
# PEST INFO
The brown plant hopper sucks sap from rice stems and causes hopper burn.

# IPM SOLUTIONS
- Release mirid bugs as natural predators.
- **Avoid** excessive nitrogen fertilizer.

# CHEMICAL SOLUTIONS
- Imidacloprid: systemic insecticide applied at tillering.
- Neem oil
- CRITICAL DISCLAIMER: Always follow the product label.

# PREVENTION TIPS
* Plant resistant varieties.
* Drain fields periodically.
";

    fn lookup() -> PesticideLookup {
        PesticideLookup::from_entries([("brown plant hopper", "Buprofezin")])
    }

    #[test]
    fn test_heading_detection() {
        assert_eq!(heading_title("# PEST INFO").as_deref(), Some("PEST INFO"));
        assert_eq!(heading_title("  ### **Pest Info:**").as_deref(), Some("Pest Info"));
        assert_eq!(heading_title("#").as_deref(), Some(""));
        assert_eq!(heading_title("#hashtag"), None);
        assert_eq!(heading_title("Pest info # not a heading"), None);
    }

    #[test]
    fn test_section_from_title() {
        assert_eq!(Section::from_title("pest info"), Some((Section::PestInfo, "")));
        assert_eq!(
            Section::from_title("Chemical Solutions: use with care"),
            Some((Section::ChemicalSolutions, "use with care"))
        );
        assert_eq!(
            Section::from_title("Pest Information"),
            Some((Section::PestInfo, ""))
        );
        assert_eq!(Section::from_title("Summary"), None);
        assert_eq!(Section::from_title("Pest"), None);
    }

    #[test]
    fn test_inline_heading_text_starts_body() {
        let text = "\
# PEST INFO: Bollworm larvae bore into cotton bolls.
They pupate in soil.
# IPM SOLUTIONS: - Use pheromone traps.
- Hand-pick larvae.
## **Prevention Tips:** Deep ploughing after harvest.
";
        let extraction = extract_recommendation("bollworm", text, &PesticideLookup::empty());
        let record = &extraction.record;

        assert_eq!(
            record.pest_info,
            "Bollworm larvae bore into cotton bolls.\nThey pupate in soil."
        );
        assert_eq!(
            record.ipm_solutions,
            vec!["Use pheromone traps.", "Hand-pick larvae."]
        );
        assert_eq!(record.prevention_tips, vec!["Deep ploughing after harvest."]);
        assert!(!extraction
            .issues
            .iter()
            .any(|(section, _)| *section == Section::PestInfo));
    }

    #[test]
    fn test_inline_chemical_entry_on_heading() {
        let text = "# CHEMICAL SOLUTIONS: Spinosad: apply at dusk.\n- Neem oil\n";
        let extraction = extract_recommendation("thrips", text, &PesticideLookup::empty());
        let chemicals = &extraction.record.chemical_solutions;

        assert_eq!(chemicals.len(), 2);
        assert_eq!(chemicals[0].pesticide, "Spinosad");
        assert_eq!(chemicals[0].notes, "apply at dusk.");
        assert_eq!(chemicals[1].pesticide, "Neem oil");
    }

    #[test]
    fn test_canonical_round_trip() {
        let extraction = extract_recommendation("brown_plant_hopper", CANONICAL, &lookup());
        let record = &extraction.record;

        assert!(!extraction.is_degraded());
        assert!(!extraction.used_lookup_fallback);
        assert_eq!(record.pest_name, "Brown Plant Hopper");
        assert_eq!(
            record.pest_info,
            "The brown plant hopper sucks sap from rice stems and causes hopper burn."
        );
        assert_eq!(
            record.ipm_solutions,
            vec![
                "Release mirid bugs as natural predators.",
                "Avoid excessive nitrogen fertilizer."
            ]
        );
        assert_eq!(
            record.prevention_tips,
            vec!["Plant resistant varieties.", "Drain fields periodically."]
        );
        assert_eq!(record.chemical_solutions.len(), 2);
        assert_eq!(record.chemical_solutions[0].pesticide, "Imidacloprid");
        assert_eq!(
            record.chemical_solutions[0].notes,
            "systemic insecticide applied at tillering."
        );
        assert_eq!(record.chemical_solutions[1].pesticide, "Neem oil");
    }

    #[test]
    fn test_chemical_line_examples() {
        let with_note = parse_chemical_line("Imidacloprid: systemic insecticide").unwrap();
        assert_eq!(with_note.pesticide, "Imidacloprid");
        assert_eq!(with_note.notes, "systemic insecticide");
        assert_eq!(with_note.dosage, DOSAGE_PLACEHOLDER);

        let bare = parse_chemical_line("- Neem oil").unwrap();
        assert_eq!(bare.pesticide, "Neem oil");
        assert_eq!(bare.notes, DEFAULT_CHEMICAL_NOTE);
        assert_eq!(bare.dosage, DOSAGE_PLACEHOLDER);
    }

    #[test]
    fn test_chemical_line_splits_on_first_colon() {
        let entry = parse_chemical_line("**Spinosad**: ratio 1:2 with water").unwrap();
        assert_eq!(entry.pesticide, "Spinosad");
        assert_eq!(entry.notes, "ratio 1:2 with water");
    }

    #[test]
    fn test_disclaimer_dropped_in_any_case() {
        assert!(parse_chemical_line("CRITICAL DISCLAIMER: read the label").is_none());
        assert!(parse_chemical_line("**critical disclaimer**: consult experts").is_none());
        assert!(parse_chemical_line("- Critical Disclaimer - wear gloves").is_none());
    }

    #[test]
    fn test_nameless_chemical_line_dropped() {
        assert!(parse_chemical_line(": just a note").is_none());
        assert!(parse_chemical_line("- **").is_none());
    }

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("  - **Crop rotation** helps"), "Crop rotation helps");
        assert_eq!(clean_line("* * nested"), "nested");
        assert_eq!(clean_line("+ plus bullet"), "plus bullet");
        assert_eq!(clean_line("   "), "");
    }

    #[test]
    fn test_clean_line_keeps_emphasised_lead_word() {
        assert_eq!(
            clean_line("- *Bacillus thuringiensis* sprays"),
            "Bacillus thuringiensis sprays"
        );
        assert_eq!(clean_line("*Trichogramma* releases"), "Trichogramma releases");
        assert_eq!(clean_line("-5 cm mulch layer"), "-5 cm mulch layer");
    }

    #[test]
    fn test_empty_text_is_total() {
        let extraction = extract_recommendation("locust", "", &PesticideLookup::empty());
        let record = &extraction.record;

        assert_eq!(record.pest_name, "Locust");
        assert_eq!(record.pest_info, INFO_FALLBACK);
        assert!(record.ipm_solutions.is_empty());
        assert!(record.chemical_solutions.is_empty());
        assert!(record.prevention_tips.is_empty());
        assert_eq!(
            extraction.issues,
            Section::ALL
                .iter()
                .map(|&section| (section, ParseIssue::Missing))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_text_without_headers_is_total() {
        let extraction = extract_recommendation(
            "aphids",
            "Aphids are small insects.\n- Spray water.\n",
            &PesticideLookup::empty(),
        );
        assert_eq!(extraction.record.pest_info, INFO_FALLBACK);
        assert_eq!(extraction.issues.len(), 4);
    }

    #[test]
    fn test_lookup_fallback_when_chemical_section_empty() {
        let text = "# PEST INFO\nSap feeder.\n# CHEMICAL SOLUTIONS\nCRITICAL DISCLAIMER: none\n";
        let extraction = extract_recommendation("Brown Plant Hopper", text, &lookup());

        assert!(extraction.used_lookup_fallback);
        assert_eq!(
            extraction.record.chemical_solutions,
            vec![ChemicalSolution {
                pesticide: "Buprofezin".to_string(),
                dosage: DOSAGE_PLACEHOLDER.to_string(),
                notes: DEFAULT_CHEMICAL_NOTE.to_string(),
            }]
        );
        assert!(extraction
            .issues
            .contains(&(Section::ChemicalSolutions, ParseIssue::NoEntries)));
    }

    #[test]
    fn test_lookup_never_overrides_parsed_entries() {
        let extraction = extract_recommendation("brown plant hopper", CANONICAL, &lookup());
        assert!(extraction
            .record
            .chemical_solutions
            .iter()
            .all(|entry| entry.pesticide != "Buprofezin"));
    }

    #[test]
    fn test_unknown_heading_closes_section() {
        let text = "# IPM SOLUTIONS\n- Use traps.\n## Summary\n- Not a tip.\n";
        let sections = split_sections(text);
        assert_eq!(sections.get(Section::IpmSolutions), "- Use traps.\n");
    }

    #[test]
    fn test_repeated_heading_keeps_first_occurrence() {
        let text = "# PEST INFO\nFirst.\n# PEST INFO\nSecond.\n";
        let sections = split_sections(text);
        assert_eq!(sections.get(Section::PestInfo), "First.\n");
    }

    #[test]
    fn test_sections_in_any_order() {
        let text = "# PREVENTION TIPS\n- Rotate crops.\n# PEST INFO\nA borer.\n";
        let extraction = extract_recommendation("borer", text, &PesticideLookup::empty());
        assert_eq!(extraction.record.pest_info, "A borer.");
        assert_eq!(extraction.record.prevention_tips, vec!["Rotate crops."]);
    }

    #[test]
    fn test_present_but_empty_section_reported_as_empty() {
        let text = "# PEST INFO\n\n   \n# IPM SOLUTIONS\n- Traps.\n";
        let extraction = extract_recommendation("moth", text, &PesticideLookup::empty());
        assert!(extraction
            .issues
            .contains(&(Section::PestInfo, ParseIssue::Empty)));
        assert!(!extraction
            .issues
            .iter()
            .any(|(section, _)| *section == Section::IpmSolutions));
    }
}
