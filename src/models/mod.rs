use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const CLASS_COUNT: usize = 10;
pub const NUTRIENT_COUNT: usize = 20;

/// Vegetable species the classifier can predict, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    BawangMerah,
    BawangPutih,
    Bayam,
    Cabai,
    Kentang,
    Kubis,
    Terong,
    Timun,
    Tomat,
    Wortel,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; CLASS_COUNT] = [
        ClassLabel::BawangMerah,
        ClassLabel::BawangPutih,
        ClassLabel::Bayam,
        ClassLabel::Cabai,
        ClassLabel::Kentang,
        ClassLabel::Kubis,
        ClassLabel::Terong,
        ClassLabel::Timun,
        ClassLabel::Tomat,
        ClassLabel::Wortel,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name as stored in the `class_name` column of the reference table.
    pub fn name(self) -> &'static str {
        match self {
            ClassLabel::BawangMerah => "Bawang Merah",
            ClassLabel::BawangPutih => "Bawang Putih",
            ClassLabel::Bayam => "Bayam",
            ClassLabel::Cabai => "Cabai",
            ClassLabel::Kentang => "Kentang",
            ClassLabel::Kubis => "Kubis",
            ClassLabel::Terong => "Terong",
            ClassLabel::Timun => "Timun",
            ClassLabel::Tomat => "Tomat",
            ClassLabel::Wortel => "Wortel",
        }
    }
}

impl std::fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for ClassLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// The fixed nutrient schema. Variant order is the canonical nutrient order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientKey {
    Energi,
    LemakTotal,
    VitaminA,
    VitaminB1,
    VitaminB2,
    VitaminB3,
    VitaminC,
    KarbohidratTotal,
    Protein,
    SeratPangan,
    Kalium,
    Fosfor,
    Natrium,
    Tembaga,
    Besi,
    Seng,
    BKaroten,
    KarotenTotal,
    Air,
    Abu,
}

impl NutrientKey {
    pub const ALL: [NutrientKey; NUTRIENT_COUNT] = [
        NutrientKey::Energi,
        NutrientKey::LemakTotal,
        NutrientKey::VitaminA,
        NutrientKey::VitaminB1,
        NutrientKey::VitaminB2,
        NutrientKey::VitaminB3,
        NutrientKey::VitaminC,
        NutrientKey::KarbohidratTotal,
        NutrientKey::Protein,
        NutrientKey::SeratPangan,
        NutrientKey::Kalium,
        NutrientKey::Fosfor,
        NutrientKey::Natrium,
        NutrientKey::Tembaga,
        NutrientKey::Besi,
        NutrientKey::Seng,
        NutrientKey::BKaroten,
        NutrientKey::KarotenTotal,
        NutrientKey::Air,
        NutrientKey::Abu,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Response key, also the amount column in the reference table.
    /// The adequacy column is the same name prefixed with `akg_`.
    pub fn as_str(self) -> &'static str {
        match self {
            NutrientKey::Energi => "energi",
            NutrientKey::LemakTotal => "lemak_total",
            NutrientKey::VitaminA => "vitamin_a",
            NutrientKey::VitaminB1 => "vitamin_b1",
            NutrientKey::VitaminB2 => "vitamin_b2",
            NutrientKey::VitaminB3 => "vitamin_b3",
            NutrientKey::VitaminC => "vitamin_c",
            NutrientKey::KarbohidratTotal => "karbohidrat_total",
            NutrientKey::Protein => "protein",
            NutrientKey::SeratPangan => "serat_pangan",
            NutrientKey::Kalium => "kalium",
            NutrientKey::Fosfor => "fosfor",
            NutrientKey::Natrium => "natrium",
            NutrientKey::Tembaga => "tembaga",
            NutrientKey::Besi => "besi",
            NutrientKey::Seng => "seng",
            NutrientKey::BKaroten => "b_karoten",
            NutrientKey::KarotenTotal => "karoten_total",
            NutrientKey::Air => "air",
            NutrientKey::Abu => "abu",
        }
    }

    /// `None` for total carotene: the reference data carries no unit for it
    /// and we do not invent one.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            NutrientKey::Energi => Some("kkal"),
            NutrientKey::LemakTotal => Some("g"),
            NutrientKey::VitaminA => Some("mcg"),
            NutrientKey::VitaminB1 => Some("mg"),
            NutrientKey::VitaminB2 => Some("mg"),
            NutrientKey::VitaminB3 => Some("mg"),
            NutrientKey::VitaminC => Some("mg"),
            NutrientKey::KarbohidratTotal => Some("mg"),
            NutrientKey::Protein => Some("g"),
            NutrientKey::SeratPangan => Some("g"),
            NutrientKey::Kalium => Some("mg"),
            NutrientKey::Fosfor => Some("mg"),
            NutrientKey::Natrium => Some("mg"),
            NutrientKey::Tembaga => Some("mg"),
            NutrientKey::Besi => Some("mcg"),
            NutrientKey::Seng => Some("mg"),
            NutrientKey::BKaroten => Some("mg"),
            NutrientKey::KarotenTotal => None,
            NutrientKey::Air => Some("g"),
            NutrientKey::Abu => Some("g"),
        }
    }

    /// Human readable label (Indonesian).
    pub fn label(self) -> &'static str {
        match self {
            NutrientKey::Energi => "Energi",
            NutrientKey::LemakTotal => "Lemak Total",
            NutrientKey::VitaminA => "Vitamin A",
            NutrientKey::VitaminB1 => "Vitamin B1",
            NutrientKey::VitaminB2 => "Vitamin B2",
            NutrientKey::VitaminB3 => "Vitamin B3",
            NutrientKey::VitaminC => "Vitamin C",
            NutrientKey::KarbohidratTotal => "Karbohidrat Total",
            NutrientKey::Protein => "Protein",
            NutrientKey::SeratPangan => "Serat Pangan",
            NutrientKey::Kalium => "Kalium",
            NutrientKey::Fosfor => "Fosfor",
            NutrientKey::Natrium => "Natrium",
            NutrientKey::Tembaga => "Tembaga",
            NutrientKey::Besi => "Besi",
            NutrientKey::Seng => "Seng",
            NutrientKey::BKaroten => "B-Karoten",
            NutrientKey::KarotenTotal => "Karoten Total",
            NutrientKey::Air => "Air",
            NutrientKey::Abu => "Abu",
        }
    }
}

impl std::fmt::Display for NutrientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for NutrientKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientEntry {
    #[serde(skip)]
    pub name: NutrientKey,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(rename = "akg")]
    pub akg_percent: f64,
}

impl NutrientEntry {
    pub fn new(name: NutrientKey, amount: f64, akg_percent: f64) -> Self {
        Self {
            name,
            amount,
            unit: name.unit(),
            akg_percent,
        }
    }
}

/// One nutrient entry per key, always stored in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionProfile {
    entries: [NutrientEntry; NUTRIENT_COUNT],
}

impl NutritionProfile {
    /// Build from `(amount, akg_percent)` pairs given in canonical order.
    pub fn from_values(values: [(f64, f64); NUTRIENT_COUNT]) -> Self {
        let entries = NutrientKey::ALL.map(|key| {
            let (amount, akg_percent) = values[key.index()];
            NutrientEntry::new(key, amount, akg_percent)
        });
        Self { entries }
    }

    pub fn try_from_fn<E>(
        mut read: impl FnMut(NutrientKey) -> Result<(f64, f64), E>,
    ) -> Result<Self, E> {
        let mut values = [(0.0, 0.0); NUTRIENT_COUNT];
        for (slot, key) in values.iter_mut().zip(NutrientKey::ALL) {
            *slot = read(key)?;
        }
        Ok(Self::from_values(values))
    }

    pub fn entries(&self) -> &[NutrientEntry] {
        &self.entries
    }
}

impl Serialize for NutritionProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.name.as_str(), entry)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub class_id: usize,
    pub class_name: ClassLabel,
    /// Softmax probability of `class_id`, in percent.
    pub confidence: f64,
    pub probabilities: [f64; CLASS_COUNT],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighestAkg {
    pub name: NutrientKey,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopNutrient {
    pub name: NutrientKey,
    pub label: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub class_id: usize,
    pub class_name: ClassLabel,
    pub confidence: f64,
    pub highest_akg: HighestAkg,
    pub top_nutrients: Vec<TopNutrient>,
    pub nutrition_info: NutritionProfile,
}
