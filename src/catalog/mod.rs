//! Static therapy catalog.
//!
//! The clinic's offerings are fixed at build time and read everywhere:
//! listings, booking (duration and cost are copied onto the appointment)
//! and dashboards.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Therapy {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Minutes
    pub duration: u32,
    /// Rupees
    pub cost: u32,
    pub category: &'static str,
    pub benefits: &'static [&'static str],
    pub precautions: &'static [&'static str],
    pub contraindications: &'static [&'static str],
    pub steps: &'static [&'static str],
    pub equipment: &'static [&'static str],
}

/// Price bands used by the catalog filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceRange {
    Low,
    Medium,
    High,
}

impl PriceRange {
    pub fn contains(&self, cost: u32) -> bool {
        match self {
            PriceRange::Low => cost < 2000,
            PriceRange::Medium => (2000..5000).contains(&cost),
            PriceRange::High => cost >= 5000,
        }
    }
}

/// Catalog filter; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub price: Option<PriceRange>,
}

impl CatalogFilter {
    fn matches(&self, therapy: &Therapy) -> bool {
        let category_ok = match self.category.as_deref() {
            None | Some("") | Some("all") => true,
            Some(category) => therapy.category.eq_ignore_ascii_case(category),
        };

        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                therapy.name.to_lowercase().contains(&term)
                    || therapy.description.to_lowercase().contains(&term)
            }
        };

        let price_ok = self.price.map_or(true, |p| p.contains(therapy.cost));

        category_ok && search_ok && price_ok
    }
}

lazy_static! {
    static ref THERAPIES: Vec<Therapy> = vec![
        Therapy {
            id: "abhyanga",
            name: "Abhyanga",
            description: "Full body oil massage with warm herbal oils to rejuvenate and detoxify the body.",
            duration: 60,
            cost: 2500,
            category: "Massage Therapy",
            benefits: &["Improves circulation", "Reduces stress", "Nourishes skin", "Enhances immunity"],
            precautions: &["Avoid heavy meals 2 hours before", "Inform about skin allergies", "Wear comfortable clothing"],
            contraindications: &["Fever", "Skin infections", "Open wounds", "Recent surgery"],
            steps: &[
                "Preparation with herbal oils",
                "Full body massage in systematic strokes",
                "Steam therapy (optional)",
                "Rest period",
                "Post-therapy care instructions",
            ],
            equipment: &["Massage table", "Herbal oils", "Towels", "Steam chamber"],
        },
        Therapy {
            id: "shirodhara",
            name: "Shirodhara",
            description: "Continuous pouring of warm oil on the forehead to calm the mind and nervous system.",
            duration: 45,
            cost: 3500,
            category: "Head Therapy",
            benefits: &["Reduces anxiety", "Improves sleep", "Mental clarity", "Stress relief"],
            precautions: &["Empty stomach preferred", "Avoid alcohol 24 hours before", "Remove contact lenses"],
            contraindications: &["Head injuries", "Severe depression", "Pregnancy (1st trimester)", "Scalp infections"],
            steps: &[
                "Patient positioning",
                "Oil temperature check",
                "Continuous oil pouring",
                "Gentle head massage",
                "Rest and recovery",
            ],
            equipment: &["Shirodhara table", "Oil vessel", "Medicated oils", "Towels"],
        },
        Therapy {
            id: "swedana",
            name: "Swedana",
            description: "Herbal steam therapy to eliminate toxins and improve circulation.",
            duration: 30,
            cost: 1800,
            category: "Steam Therapy",
            benefits: &["Detoxification", "Pain relief", "Improved flexibility", "Better circulation"],
            precautions: &["Stay hydrated", "Inform about heart conditions", "Remove jewelry"],
            contraindications: &["Pregnancy", "Heart disease", "High fever", "Severe weakness"],
            steps: &[
                "Pre-therapy assessment",
                "Herbal steam preparation",
                "Gradual steam exposure",
                "Monitoring vital signs",
                "Cool down period",
            ],
            equipment: &["Steam chamber", "Herbal decoctions", "Towels", "Monitoring equipment"],
        },
        Therapy {
            id: "panchakarma",
            name: "Panchakarma Package",
            description: "Complete detoxification program including all five cleansing procedures.",
            duration: 180,
            cost: 15000,
            category: "Complete Package",
            benefits: &["Complete detox", "Hormonal balance", "Immunity boost", "Mental clarity"],
            precautions: &["Medical consultation required", "Follow dietary guidelines", "Complete health assessment"],
            contraindications: &["Severe illness", "Recent surgery", "Pregnancy", "Severe mental disorders"],
            steps: &[
                "Initial consultation and assessment",
                "Preparatory procedures (Purvakarma)",
                "Main procedures (Pradhanakarma)",
                "Post-therapy care (Paschatkarma)",
                "Follow-up consultations",
            ],
            equipment: &["Multiple therapy rooms", "Specialized equipment", "Herbal medicines", "Monitoring devices"],
        },
        Therapy {
            id: "nasya",
            name: "Nasya",
            description: "Nasal administration of medicated oils to treat respiratory and neurological disorders.",
            duration: 20,
            cost: 1200,
            category: "Nasal Therapy",
            benefits: &["Clear sinuses", "Improved breathing", "Mental clarity", "Headache relief"],
            precautions: &["Clear nasal passages", "No cold symptoms", "Avoid food 1 hour before"],
            contraindications: &["Nasal bleeding", "Severe cold", "Nasal polyps", "Recent nasal surgery"],
            steps: &[
                "Nasal examination",
                "Oil preparation",
                "Gentle nasal administration",
                "Post-therapy rest",
                "Aftercare instructions",
            ],
            equipment: &["Nasal drops", "Medicated oils", "Examination tools", "Tissues"],
        },
        Therapy {
            id: "basti",
            name: "Basti",
            description: "Medicated enemas to cleanse the colon and balance Vata dosha.",
            duration: 40,
            cost: 2800,
            category: "Colon Therapy",
            benefits: &["Digestive health", "Pain relief", "Nervous system balance", "Toxin elimination"],
            precautions: &["Empty stomach required", "Follow preparation guidelines", "Proper hydration"],
            contraindications: &["Diarrhea", "Rectal bleeding", "Severe weakness", "Inflammatory bowel disease"],
            steps: &[
                "Pre-therapy preparation",
                "Medicated enema administration",
                "Retention period",
                "Evacuation",
                "Post-therapy care",
            ],
            equipment: &["Enema equipment", "Medicated oils", "Monitoring devices", "Privacy screens"],
        },
    ];
}

/// Every therapy, in catalog order
pub fn all() -> &'static [Therapy] {
    &THERAPIES
}

pub fn get(id: &str) -> Option<&'static Therapy> {
    THERAPIES.iter().find(|t| t.id == id)
}

pub fn list(filter: &CatalogFilter) -> Vec<&'static Therapy> {
    THERAPIES.iter().filter(|t| filter.matches(t)).collect()
}

/// Distinct categories in catalog order
pub fn categories() -> Vec<&'static str> {
    let mut seen: Vec<&'static str> = Vec::new();
    for therapy in THERAPIES.iter() {
        if !seen.contains(&therapy.category) {
            seen.push(therapy.category);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_are_unique() {
        let mut ids: Vec<&str> = all().iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn test_get_abhyanga() {
        let therapy = get("abhyanga").unwrap();
        assert_eq!(therapy.duration, 60);
        assert_eq!(therapy.cost, 2500);
        assert!(get("reiki").is_none());
    }

    #[test]
    fn test_price_ranges() {
        let low = list(&CatalogFilter {
            price: Some(PriceRange::Low),
            ..Default::default()
        });
        let low_ids: Vec<&str> = low.iter().map(|t| t.id).collect();
        assert_eq!(low_ids, vec!["swedana", "nasya"]);

        let high = list(&CatalogFilter {
            price: Some(PriceRange::High),
            ..Default::default()
        });
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].id, "panchakarma");

        assert!(PriceRange::Medium.contains(2000));
        assert!(!PriceRange::Medium.contains(5000));
    }

    #[test]
    fn test_search_matches_name_and_description() {
        let by_name = list(&CatalogFilter {
            search: Some("shiro".to_string()),
            ..Default::default()
        });
        assert_eq!(by_name.len(), 1);

        let by_description = list(&CatalogFilter {
            search: Some("STEAM".to_string()),
            ..Default::default()
        });
        assert_eq!(by_description[0].id, "swedana");
    }

    #[test]
    fn test_category_filter_and_all() {
        let head = list(&CatalogFilter {
            category: Some("head therapy".to_string()),
            ..Default::default()
        });
        assert_eq!(head.len(), 1);

        let everything = list(&CatalogFilter {
            category: Some("all".to_string()),
            ..Default::default()
        });
        assert_eq!(everything.len(), 6);
        assert_eq!(categories().len(), 6);
    }
}
