use serde::Serialize;
use std::fmt;

/// Care tips and treatment products for one disease class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub care_tips: &'static [&'static str],
    /// Empty for healthy plants
    pub treatments: &'static [&'static str],
}

const EARLY_BLIGHT: Recommendations = Recommendations {
    care_tips: &[
        "Rotate Crops: Change the planting location every 2 to 3 years to avoid soil-borne \
         pathogens.",
        "Remove Infected Leaves: Trim and destroy any infected or yellowing lower leaves.",
        "Water at Base: Avoid overhead watering; use drip irrigation to reduce leaf wetness.",
        "Use Resistant Varieties: Choose tomato varieties that are resistant to early blight.",
        "Apply Mulch: Add straw or plastic mulch to prevent soil splash and reduce infection.",
    ],
    treatments: &["Daconil", "Mancozeb", "Copper-based Fungicides", "Azoxystrobin"],
};

const HEALTHY: Recommendations = Recommendations {
    care_tips: &[
        "Choose Healthy, Disease-Resistant Varieties: Start with strong, certified, and \
         blight-resistant seeds or seedlings.",
        "Ensure Proper Sunlight: Tomatoes need at least 6 to 8 hours of direct sunlight daily.",
        "Use Well-Drained, Nutrient-Rich Soil: Mix compost or organic matter to improve soil \
         fertility.",
        "Water Deeply but Less Frequently: Water at the base to encourage deep root growth and \
         avoid leaf diseases.",
        "Practice Regular Monitoring and Maintenance: Check leaves weekly for pests or disease \
         and act early.",
    ],
    treatments: &[],
};

const LATE_BLIGHT: Recommendations = Recommendations {
    care_tips: &[
        "Use Resistant Varieties: Plant tomato varieties that resist late blight.",
        "Keep the Field Clean: Remove infected plants and dispose of crop debris properly.",
        "Water Carefully: Avoid overhead watering and use drip irrigation.",
        "Apply Fungicides: Protect plants with copper or chlorothalonil based fungicides.",
        "Watch the Weather: Follow the forecast and stay alert during cool, wet conditions.",
    ],
    treatments: &[
        "Copper-based Fungicides (e.g. Copper Oxychloride)",
        "Chlorothalonil (e.g. Daconil)",
        "Mancozeb (e.g. Dithane M-45)",
        "Start fungicides early in the season and repeat every 7 to 10 days",
    ],
};

const SEPTORIA: Recommendations = Recommendations {
    care_tips: &[
        "Remove Lower Leaves: Prune lower leaves, especially if they touch the soil or show \
         signs of spots.",
        "Avoid Overhead Watering: Use drip irrigation to keep leaves dry and reduce disease \
         spread.",
        "Use Disease-Free Seeds/Seedlings: Always start with clean, certified seeds or seedlings.",
        "Rotate Crops: Avoid planting tomatoes or related crops (like potatoes, eggplants) in \
         the same spot every year.",
        "Improve Air Circulation: Space plants properly and stake them to promote airflow and \
         reduce humidity around leaves.",
    ],
    treatments: &[
        "Mancozeb",
        "Neem Oil (for mild cases and organic control)",
        "Copper-based Fungicides",
        "Chlorothalonil",
    ],
};

/// Same order as [`DISEASE_LABELS`](crate::models::DISEASE_LABELS)
static BY_DISEASE: [(&str, Recommendations); 4] = [
    ("Early Blight", EARLY_BLIGHT),
    ("Healthy", HEALTHY),
    ("Late Blight", LATE_BLIGHT),
    ("Septoria", SEPTORIA),
];

/// Recommendations for a disease label, `None` for anything else.
pub fn recommendations_for(label: &str) -> Option<&'static Recommendations> {
    BY_DISEASE
        .iter()
        .find(|(disease, _)| *disease == label)
        .map(|(_, recommendations)| recommendations)
}

impl fmt::Display for Recommendations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Care tips:")?;
        for tip in self.care_tips {
            writeln!(f, "  - {}", tip)?;
        }
        if !self.treatments.is_empty() {
            writeln!(f, "Treatments:")?;
            for treatment in self.treatments {
                writeln!(f, "  - {}", treatment)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DISEASE_LABELS, LEAF_LABELS};

    #[test]
    fn every_disease_label_has_recommendations() {
        for label in DISEASE_LABELS.labels() {
            let recommendations = recommendations_for(label)
                .unwrap_or_else(|| panic!("no recommendations for {}", label));
            assert_eq!(recommendations.care_tips.len(), 5, "{}", label);
        }
    }

    #[test]
    fn diseases_list_four_treatments_and_healthy_none() {
        assert!(recommendations_for("Healthy").unwrap().treatments.is_empty());
        for label in ["Early Blight", "Late Blight", "Septoria"] {
            assert_eq!(recommendations_for(label).unwrap().treatments.len(), 4);
        }
    }

    #[test]
    fn leaf_gate_labels_have_none() {
        for label in LEAF_LABELS.labels() {
            assert!(recommendations_for(label).is_none());
        }
        assert!(recommendations_for("Not a leaf").is_none());
    }

    #[test]
    fn display_skips_empty_treatments() {
        let healthy = recommendations_for("Healthy").unwrap().to_string();
        assert!(healthy.starts_with("Care tips:\n"));
        assert!(!healthy.contains("Treatments:"));

        let septoria = recommendations_for("Septoria").unwrap().to_string();
        assert!(septoria.contains("Treatments:\n  - Mancozeb\n"));
    }
}
