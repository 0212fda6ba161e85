use serde::Serialize;

use crate::models::{NutritionItem, NutritionReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Calories,
    Protein,
    Carbs,
    Fat,
}

impl Nutrient {
    pub const ALL: [Nutrient; 4] = [Nutrient::Calories, Nutrient::Protein, Nutrient::Carbs, Nutrient::Fat];

    pub fn label(&self) -> &'static str {
        match self {
            Nutrient::Calories => "Calories",
            Nutrient::Protein => "Protein",
            Nutrient::Carbs => "Carbs",
            Nutrient::Fat => "Fat",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Nutrient::Calories => "kcal",
            _ => "g",
        }
    }

    /// Reference daily value used as the 100% mark.
    pub fn reference(&self) -> f64 {
        match self {
            Nutrient::Calories => 2000.0,
            Nutrient::Protein => 50.0,
            Nutrient::Carbs => 300.0,
            Nutrient::Fat => 70.0,
        }
    }

    fn value_of(&self, item: &NutritionItem) -> f64 {
        match self {
            Nutrient::Calories => item.calories,
            Nutrient::Protein => item.protein_grams,
            Nutrient::Carbs => item.carbs_grams,
            Nutrient::Fat => item.fat_grams,
        }
    }
}

/// Share of `reference` covered by `value`, clamped to 0..=100.
pub fn percent_of_reference(value: f64, reference: f64) -> f64 {
    let percent = value / reference * 100.0;
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientReading {
    pub nutrient: Nutrient,
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
    pub percent: f64,
    pub display_percent: u8,
}

impl NutrientReading {
    pub fn new(nutrient: Nutrient, value: f64) -> Self {
        let percent = percent_of_reference(value, nutrient.reference());
        Self {
            nutrient,
            label: nutrient.label(),
            value,
            unit: nutrient.unit(),
            percent,
            display_percent: percent.round() as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCard {
    pub title: String,
    pub subtitle: &'static str,
    pub nutrients: Vec<NutrientReading>,
}

impl ItemCard {
    pub fn from_item(item: &NutritionItem) -> Self {
        Self {
            title: item.name.clone(),
            subtitle: "Nutritional Breakdown",
            nutrients: Nutrient::ALL
                .iter()
                .map(|nutrient| NutrientReading::new(*nutrient, nutrient.value_of(item)))
                .collect(),
        }
    }
}

pub fn render_report(report: &NutritionReport) -> Vec<ItemCard> {
    report.items.iter().map(ItemCard::from_item).collect()
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 10.0) as usize).min(10); // 10 cells
    let empty = 10 - filled;

    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// Plain-text card, used for console summaries.
pub fn format_card(card: &ItemCard) -> String {
    let mut text = format!("🍽️ {}\n{}\n", card.title, card.subtitle);

    for reading in &card.nutrients {
        text.push_str(&format!(
            "\n{}\n{}\n{:.1} {} ({}%)\n",
            reading.label,
            progress_bar(reading.percent),
            reading.value,
            reading.unit,
            reading.display_percent
        ));
    }

    text
}
