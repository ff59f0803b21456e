//! Deterministic first tier of specification extraction.
//!
//! Every pattern is compiled once. A field the patterns cannot find is left
//! absent; callers decide whether to escalate it to a completion fallback.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::analysis::ExtractedSpecs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecField {
    Voltage,
    Size,
    Conductor,
    Insulation,
    Armoring,
    Standard,
    Quantity,
}

impl SpecField {
    pub const ALL: [SpecField; 7] = [
        SpecField::Voltage,
        SpecField::Size,
        SpecField::Conductor,
        SpecField::Insulation,
        SpecField::Armoring,
        SpecField::Standard,
        SpecField::Quantity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::Size => "size",
            Self::Conductor => "conductor",
            Self::Insulation => "insulation",
            Self::Armoring => "armoring",
            Self::Standard => "standard",
            Self::Quantity => "quantity",
        }
    }

    pub fn is_present(&self, specs: &ExtractedSpecs) -> bool {
        match self {
            Self::Quantity => specs.quantity.is_some(),
            other => specs.field(other.as_str()).is_some(),
        }
    }

    /// Stores a fallback answer. Returns `false` when the answer means "absent".
    pub fn apply(&self, specs: &mut ExtractedSpecs, raw: &str) -> bool {
        let Some(value) = clean_answer(raw) else {
            return false;
        };

        let slot = match self {
            Self::Quantity => {
                return match parse_quantity_answer(&value) {
                    Some(meters) => {
                        specs.quantity = Some(meters);
                        true
                    }
                    None => false,
                };
            }
            Self::Voltage => &mut specs.voltage,
            Self::Size => &mut specs.size,
            Self::Conductor => &mut specs.conductor,
            Self::Insulation => &mut specs.insulation,
            Self::Armoring => &mut specs.armoring,
            Self::Standard => &mut specs.standard,
        };
        *slot = Some(value);
        true
    }
}

pub fn missing_fields(specs: &ExtractedSpecs) -> Vec<SpecField> {
    SpecField::ALL.into_iter().filter(|field| !field.is_present(specs)).collect()
}

fn clean_answer(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    let value = value.strip_suffix('.').unwrap_or(value).trim();
    let lowered = value.to_ascii_lowercase();
    let absent = value.is_empty()
        || lowered.starts_with("not specified")
        || lowered == "unknown"
        || lowered == "n/a";
    (!absent).then(|| value.to_string())
}

fn parse_quantity_answer(value: &str) -> Option<u32> {
    let captures = quantity_answer_pattern().captures(value)?;
    let digits = captures.get(1)?.as_str().replace(',', "");
    let amount = digits.parse::<u32>().ok()?;
    let in_km = captures.get(2).is_some_and(|unit| unit.as_str().eq_ignore_ascii_case("km"));
    let meters = if in_km { amount.checked_mul(1000) } else { Some(amount) };
    meters.filter(|meters| *meters > 0)
}

/// Everything the regex tier recovers from one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub specs: ExtractedSpecs,
    pub testing_requirements: Vec<String>,
    pub certifications: Vec<String>,
    pub delivery_timeline: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SpecExtractor;

impl SpecExtractor {
    pub fn extract(&self, text: &str) -> ExtractionReport {
        ExtractionReport {
            specs: self.extract_specs(text),
            testing_requirements: self.extract_testing_requirements(text),
            certifications: self.extract_certifications(text),
            delivery_timeline: self.extract_delivery_timeline(text),
            deadline: self.extract_deadline(text),
        }
    }

    pub fn extract_specs(&self, text: &str) -> ExtractedSpecs {
        let patterns = spec_patterns();
        let mut specs = ExtractedSpecs::default();

        if let Some(captures) = patterns.voltage.captures(text) {
            specs.voltage = Some(format!("{}kV", &captures[1]));
        }

        if let Some(captures) = patterns.size.captures(text) {
            specs.size = Some(captures[1].trim().to_string());
        }

        if let Some(captures) = patterns.conductor.captures(text) {
            let material = captures[1].to_ascii_lowercase();
            specs.conductor = Some(match material.as_str() {
                "al" | "aluminum" => "Aluminum".to_string(),
                "cu" | "copper" => "Copper".to_string(),
                other => capitalize(other),
            });
        }

        if let Some(captures) = patterns.insulation.captures(text) {
            specs.insulation = Some(captures[1].to_ascii_uppercase());
        }

        if let Some(captures) = patterns.armoring.captures(text) {
            specs.armoring = Some(captures[1].to_string());
        }

        if let Some(captures) = patterns.standard.captures(text) {
            let upper = captures[1].to_ascii_uppercase();
            specs.standard = Some(patterns.whitespace.replace_all(&upper, " ").into_owned());
        }

        if let Some(captures) = patterns.quantity.captures(text) {
            let digits = captures[1].replace(',', "");
            let unit = captures[2].to_ascii_lowercase();
            // A zero quantity is treated as unstated.
            specs.quantity = digits
                .parse::<u32>()
                .ok()
                .and_then(|amount| if unit == "km" { amount.checked_mul(1000) } else { Some(amount) })
                .filter(|meters| *meters > 0);
        }

        specs
    }

    /// Test names in pattern order, first letter capitalised, de-duplicated.
    pub fn extract_testing_requirements(&self, text: &str) -> Vec<String> {
        let mut tests = Vec::new();
        for pattern in test_patterns() {
            if let Some(found) = pattern.find(text) {
                let name = capitalize(found.as_str());
                if !tests.contains(&name) {
                    tests.push(name);
                }
            }
        }
        tests
    }

    pub fn extract_certifications(&self, text: &str) -> Vec<String> {
        let mut certifications = Vec::new();
        for pattern in certification_patterns() {
            if let Some(found) = pattern.find(text) {
                let name = found.as_str().trim().to_string();
                if !certifications.contains(&name) {
                    certifications.push(name);
                }
            }
        }
        certifications
    }

    pub fn extract_delivery_timeline(&self, text: &str) -> Option<String> {
        spec_patterns()
            .timeline
            .captures(text)
            .map(|captures| format!("Within {} {}", &captures[1], captures[2].to_ascii_lowercase()))
    }

    /// The submission deadline exactly as written in the document.
    pub fn extract_deadline(&self, text: &str) -> Option<String> {
        let patterns = spec_patterns();
        [&patterns.deadline_numeric, &patterns.deadline_named]
            .into_iter()
            .find_map(|pattern| pattern.captures(text).map(|captures| captures[1].to_string()))
    }
}

/// Parses the date forms `extract_deadline` recognises.
pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let normalized = raw.trim().replace('/', "-");
    const FORMATS: [&str; 6] = ["%d-%m-%Y", "%d-%m-%y", "%d %b %Y", "%d %B %Y", "%d %b %y", "%Y-%m-%d"];
    FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct SpecPatterns {
    voltage: Regex,
    size: Regex,
    conductor: Regex,
    insulation: Regex,
    armoring: Regex,
    standard: Regex,
    quantity: Regex,
    timeline: Regex,
    deadline_numeric: Regex,
    deadline_named: Regex,
    whitespace: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

fn spec_patterns() -> &'static SpecPatterns {
    static PATTERNS: OnceLock<SpecPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SpecPatterns {
        voltage: compile(r"(?i)(\d+\.?\d*)\s*(kV|kilovolt)"),
        size: compile(r"(?i)(\d+C?\s*x\s*\d+\.?\d*)\s*(sq\.?\s*mm|sqmm|mm2|mm²)"),
        conductor: compile(r"(?i)conductor[:\s]*(aluminum|copper|al|cu)"),
        insulation: compile(r"(?i)insulation[:\s]*(XLPE|PVC|LSZH|EPR|FR-?PVC)"),
        armoring: compile(
            r"(?i)armor(?:ing|ed)?[:\s]*(SWA|AWA|Steel Wire|Aluminum Wire|Unarmored|None)",
        ),
        standard: compile(r"(?i)(IS\s*\d+|IEC\s*\d+[-\d]*|BS\s*\d+|ASTM\s*[A-Z]?\d+)"),
        quantity: compile(r"(?i)quantity[:\s]*(\d+[\d,]*)\s*(meter|metre|m|km)"),
        timeline: compile(
            r"(?i)(?:delivery|completion|supply).*?within\s+(\d+)\s+(days?|weeks?|months?)",
        ),
        deadline_numeric: compile(
            r"(?i)(?:deadline|due date|last date).*?(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
        ),
        deadline_named: compile(
            r"(?i)(?:deadline|due date|last date).*?(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{2,4})",
        ),
        whitespace: compile(r"\s+"),
    })
}

fn quantity_answer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?i)(\d[\d,]*)\s*(km)?"))
}

fn test_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)routine\s+test",
            r"(?i)type\s+test",
            r"(?i)sample\s+test",
            r"(?i)high\s+voltage\s+test",
            r"(?i)partial\s+discharge\s+test",
            r"(?i)conductor\s+resistance\s+test",
            r"(?i)insulation\s+resistance\s+test",
            r"(?i)impulse\s+voltage\s+test",
            r"(?i)thermal\s+cycling\s+test",
            r"(?i)flame\s+retardant\s+test",
            r"(?i)fire\s+survival\s+test",
            r"(?i)smoke\s+density\s+test",
            r"(?i)uv\s+resistance\s+test",
            r"(?i)weather\s+resistance\s+test",
            r"(?i)tensile\s+strength\s+test",
        ]
        .into_iter()
        .map(compile)
        .collect()
    })
}

fn certification_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)BIS\s+Certif(?:ication|ied)",
            r"(?i)ISO\s+\d+:\d+",
            r"(?i)IEC\s+Certif(?:ication|ied)",
            r"(?i)CPRI\s+Approv(?:ed|al)",
            r"(?i)RDSO\s+Approv(?:ed|al)",
            r"(?i)NABL\s+Accredit(?:ed|ation)",
            r"(?i)BS\s+\d+\s+(?:CWZ|Category)",
            r"(?i)LSZH\s+Certif(?:icate|ied)",
            r"(?i)Factory\s+Inspection\s+Certificate",
            r"(?i)Fire\s+Test\s+Certificate",
            r"(?i)Weather\s+Test\s+Certificate",
        ]
        .into_iter()
        .map(compile)
        .collect()
    })
}
