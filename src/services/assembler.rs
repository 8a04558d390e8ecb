use crate::models::{
    ClassificationResult, HighestAkg, NutrientEntry, NutritionProfile, PredictionResponse,
    TopNutrient,
};

/// Number of entries reported in `top_nutrients`.
pub const TOP_NUTRIENT_COUNT: usize = 3;

/// Combines a classification with its nutrition profile into the final answer.
#[derive(Debug, Clone, Default)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(
        &self,
        result: &ClassificationResult,
        profile: &NutritionProfile,
    ) -> PredictionResponse {
        let top = top_nutrients(profile, TOP_NUTRIENT_COUNT);
        let highest = &top[0];

        PredictionResponse {
            class_id: result.class_id,
            class_name: result.class_name,
            confidence: result.confidence,
            highest_akg: HighestAkg {
                name: highest.name,
                value: highest.akg_percent,
            },
            top_nutrients: top
                .iter()
                .map(|entry| TopNutrient {
                    name: entry.name,
                    label: entry.name.label(),
                    value: entry.akg_percent,
                })
                .collect(),
            nutrition_info: profile.clone(),
        }
    }
}

/// Entries with the largest `akg_percent`, descending. The sort is stable, so
/// equal values keep canonical order and the first entry is the highest-AKG
/// nutrient with ties going to the earlier key.
fn top_nutrients(profile: &NutritionProfile, count: usize) -> Vec<&NutrientEntry> {
    let mut entries: Vec<&NutrientEntry> = profile.entries().iter().collect();
    entries.sort_by(|a, b| b.akg_percent.total_cmp(&a.akg_percent));
    entries.truncate(count.max(1));
    entries
}
