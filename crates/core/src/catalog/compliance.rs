use crate::domain::analysis::{ComparisonRow, ExtractedSpecs, ProductMatch};

const TEST_CAPABILITIES: [(&str, &str); 15] = [
    ("routine", "Routine Test - In-house lab"),
    ("type", "Type Test - NABL accredited facility"),
    ("sample", "Sample Test - Available"),
    ("high voltage", "High Voltage Test - CPRI approved lab"),
    ("partial discharge", "Partial Discharge Test - Available"),
    ("conductor resistance", "Conductor Resistance Test - In-house"),
    ("insulation resistance", "Insulation Resistance Test - In-house"),
    ("impulse", "Impulse Voltage Test - Available"),
    ("thermal", "Thermal Cycling Test - Available"),
    ("flame", "Flame Retardant Test - NABL accredited"),
    ("fire", "Fire Survival Test - BS 6387 certified lab"),
    ("smoke", "Smoke Density Test - Available"),
    ("uv", "UV Resistance Test - Available"),
    ("weather", "Weather Resistance Test - Available"),
    ("tensile", "Tensile Strength Test - Available"),
];

const DEFAULT_CAPABILITIES: [&str; 3] =
    ["Routine Test - In-house lab", "Type Test - Available", "Sample Test - NABL accredited"];

const COMPARED_PARAMETERS: [(&str, &str); 6] = [
    ("voltage", "Voltage Rating"),
    ("size", "Size/Cross-section"),
    ("conductor", "Conductor Material"),
    ("insulation", "Insulation Type"),
    ("armoring", "Armoring"),
    ("standard", "Standard"),
];

fn push_unique(list: &mut Vec<String>, value: impl Into<String>) {
    let value = value.into();
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Standards the bid should declare compliance with, in first-seen order.
pub fn standards_for(specs: &ExtractedSpecs, certifications: &[String]) -> Vec<String> {
    let mut standards = Vec::new();

    if let Some(standard) = &specs.standard {
        push_unique(&mut standards, standard.as_str());
    }

    if let Some(voltage) = &specs.voltage {
        if ["11", "22", "33"].iter().any(|rating| voltage.contains(rating)) {
            push_unique(&mut standards, "IS 7098 Part 2");
            push_unique(&mut standards, "IEC 60502-2");
        } else if voltage.contains("1.1") || voltage.contains("0.6") {
            push_unique(&mut standards, "IS 1554");
            push_unique(&mut standards, "IEC 60227");
        }
    }

    for certification in certifications {
        let is_standard = ["IS ", "IEC ", "BS "].iter().any(|body| certification.contains(body));
        if is_standard {
            push_unique(&mut standards, certification.as_str());
        }
    }

    push_unique(&mut standards, "BIS Certified");
    push_unique(&mut standards, "ISO 9001:2015");
    standards
}

pub fn testing_capabilities(required_tests: &[String]) -> Vec<String> {
    let mut capabilities = Vec::new();
    for test in required_tests {
        let lowered = test.to_lowercase();
        for (keyword, capability) in TEST_CAPABILITIES {
            if lowered.contains(keyword) {
                push_unique(&mut capabilities, capability);
            }
        }
    }

    if capabilities.is_empty() {
        capabilities = DEFAULT_CAPABILITIES.iter().map(|value| value.to_string()).collect();
    }
    capabilities
}

/// Tender requirement beside each recommended product, one row per parameter.
pub fn comparison_table(specs: &ExtractedSpecs, recommendations: &[ProductMatch]) -> Vec<ComparisonRow> {
    let mut rows: Vec<ComparisonRow> = COMPARED_PARAMETERS
        .iter()
        .map(|(key, label)| ComparisonRow {
            parameter: label.to_string(),
            requirement: specs.field(key).unwrap_or("Not specified").to_string(),
            candidates: recommendations
                .iter()
                .map(|candidate| candidate.specifications.field(key).unwrap_or("-").to_string())
                .collect(),
        })
        .collect();

    rows.push(ComparisonRow {
        parameter: "Price per Meter".to_string(),
        requirement: "-".to_string(),
        candidates: recommendations
            .iter()
            .map(|candidate| match candidate.price_per_meter {
                Some(price) => format!("₹{price}"),
                None => "-".to_string(),
            })
            .collect(),
    });

    rows
}
