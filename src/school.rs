// 🏫 School Entity - the record every other module works on
//
// Two shapes:
// - School:        fully populated value (catalog rows, reconciled results)
// - PartialSchool: whatever the external search provider sent, every field optional
//
// The only way from PartialSchool to School is an explicit conversion or merge.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Display string used whenever a fee cannot be determined
pub const CONTACT_FOR_FEES: &str = "Contact School for Fees";

/// Class size assigned when no source provides one
pub const DEFAULT_CLASS_SIZE: u32 = 12;

// ============================================================================
// ENROLLMENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    #[default]
    Open,
    Waitlist,
    Closed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Open => "Open",
            EnrollmentStatus::Waitlist => "Waitlist",
            EnrollmentStatus::Closed => "Closed",
        }
    }

    /// Case-insensitive; anything unrecognised falls back to Open
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "waitlist" => EnrollmentStatus::Waitlist,
            "closed" => EnrollmentStatus::Closed,
            _ => EnrollmentStatus::Open,
        }
    }
}

// ============================================================================
// TRI-STATE FLAG
// ============================================================================

/// Capability flag where "not stated" must stay distinguishable from "no".
/// Serialized as `true` / `false` / `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unknown,
}

impl TriState {
    pub fn is_yes(&self) -> bool {
        matches!(self, TriState::Yes)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TriState::Unknown)
    }

    /// Nullable coalescing: keep self when known, otherwise take `other`
    pub fn or(self, other: TriState) -> TriState {
        if self.is_known() {
            self
        } else {
            other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TriState::Yes => "Yes",
            TriState::No => "No",
            TriState::Unknown => "Unknown",
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::Yes
        } else {
            TriState::No
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(TriState::from).unwrap_or(TriState::Unknown)
    }
}

impl From<TriState> for Option<bool> {
    fn from(value: TriState) -> Self {
        match value {
            TriState::Yes => Some(true),
            TriState::No => Some(false),
            TriState::Unknown => None,
        }
    }
}

// ============================================================================
// TESTIMONIAL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub author: String,
    pub text: String,
    /// Always within 1..=5
    pub rating: u8,
}

impl Testimonial {
    pub fn new(author: impl Into<String>, text: impl Into<String>, rating: i64) -> Self {
        Testimonial {
            author: author.into(),
            text: text.into(),
            rating: rating.clamp(1, 5) as u8,
        }
    }
}

// ============================================================================
// SCHOOL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    // Identity
    pub id: String,
    pub name: String,

    // Location / contact
    pub address: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub distance_km: Option<f64>,

    // Commercial
    pub tuition_range: String,
    pub fee_document_url: Option<String>,

    // Programmes and capabilities
    pub special_needs_programs: Vec<String>,
    pub adhd_support: bool,
    pub autism_support: TriState,
    pub has_on_site_therapists: bool,
    pub offers_iep: bool,
    pub has_sensory_friendly_facilities: bool,
    pub educational_approach: String,
    pub average_class_size: u32,
    pub brief_description: String,
    pub enrollment_status: EnrollmentStatus,

    // Social proof
    pub parent_testimonials: Vec<Testimonial>,

    // Geo (0.0 = not set)
    pub lat: f64,
    pub lng: f64,
}

impl School {
    /// Minimal school with every optional attribute at its default
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        School {
            id: school_id(&name),
            name,
            address: None,
            website: None,
            phone_number: None,
            email: None,
            distance_km: None,
            tuition_range: CONTACT_FOR_FEES.to_string(),
            fee_document_url: None,
            special_needs_programs: Vec::new(),
            adhd_support: false,
            autism_support: TriState::Unknown,
            has_on_site_therapists: false,
            offers_iep: false,
            has_sensory_friendly_facilities: false,
            educational_approach: String::new(),
            average_class_size: DEFAULT_CLASS_SIZE,
            brief_description: String::new(),
            enrollment_status: EnrollmentStatus::Open,
            parent_testimonials: Vec::new(),
            lat: 0.0,
            lng: 0.0,
        }
    }

    /// Mean testimonial rating, 0.0 when there are none
    pub fn average_rating(&self) -> f64 {
        if self.parent_testimonials.is_empty() {
            return 0.0;
        }
        let total: u32 = self
            .parent_testimonials
            .iter()
            .map(|t| t.rating as u32)
            .sum();
        total as f64 / self.parent_testimonials.len() as f64
    }
}

/// Stable id derived from a name.
///
/// Lower-case, whitespace runs become one hyphen, everything outside
/// `[a-z0-9-]` is dropped. "St. Mary's School" → "st-marys-school".
/// Names that only differ in punctuation share an id; that collision is accepted.
pub fn school_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                id.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            id.push(c);
        }
    }

    id
}

// ============================================================================
// PARTIAL SCHOOL (external provider records)
// ============================================================================

/// School-shaped record from the external search provider.
///
/// Every attribute may be missing and values arrive loosely typed, so each
/// field is decoded leniently: a value of the wrong shape reads as absent
/// instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialSchool {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub distance_km: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tuition_range: Option<String>,
    #[serde(default, alias = "fee_pdf_url", deserialize_with = "lenient_string")]
    pub fee_document_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub special_needs_programs: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub adhd_support: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub autism_support: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_on_site_therapists: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub offers_iep: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_sensory_friendly_facilities: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub educational_approach: Option<String>,
    #[serde(default, deserialize_with = "lenient_class_size")]
    pub average_class_size: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brief_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub enrollment_status: Option<EnrollmentStatus>,
    #[serde(default, deserialize_with = "lenient_testimonials")]
    pub parent_testimonials: Option<Vec<Testimonial>>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
}

impl PartialSchool {
    pub fn named(name: impl Into<String>) -> Self {
        PartialSchool {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Fill every missing attribute with its default.
    ///
    /// Flags default to false except autism support, which stays Unknown.
    /// A provider id is kept as given; one is derived from the name only
    /// when the record has none.
    pub fn into_school(self) -> School {
        let name = self.name.unwrap_or_default();
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => school_id(&name),
        };

        School {
            id,
            name,
            address: self.address,
            website: self.website,
            phone_number: self.phone_number,
            email: self.email,
            distance_km: self.distance_km,
            tuition_range: self
                .tuition_range
                .unwrap_or_else(|| CONTACT_FOR_FEES.to_string()),
            fee_document_url: self.fee_document_url,
            special_needs_programs: self.special_needs_programs.unwrap_or_default(),
            adhd_support: self.adhd_support.unwrap_or(false),
            autism_support: TriState::from(self.autism_support),
            has_on_site_therapists: self.has_on_site_therapists.unwrap_or(false),
            offers_iep: self.offers_iep.unwrap_or(false),
            has_sensory_friendly_facilities: self
                .has_sensory_friendly_facilities
                .unwrap_or(false),
            educational_approach: self.educational_approach.unwrap_or_default(),
            average_class_size: self.average_class_size.unwrap_or(DEFAULT_CLASS_SIZE),
            brief_description: self.brief_description.unwrap_or_default(),
            enrollment_status: self.enrollment_status.unwrap_or_default(),
            parent_testimonials: self.parent_testimonials.unwrap_or_default(),
            lat: self.lat.unwrap_or(0.0),
            lng: self.lng.unwrap_or(0.0),
        }
    }
}

// ============================================================================
// LENIENT DECODERS
// ============================================================================

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }))
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(number_of).filter(|n| n.is_finite()))
}

fn lenient_class_size<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value
        .as_ref()
        .and_then(number_of)
        .map(f64::round)
        .filter(|n| *n >= 1.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<Option<EnrollmentStatus>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(EnrollmentStatus::parse(&s)),
        _ => None,
    }))
}

fn lenient_string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }))
}

fn lenient_testimonials<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Vec<Testimonial>>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return Ok(None),
    };

    let testimonials = items
        .iter()
        .filter_map(|item| {
            let rating = item.get("rating").and_then(number_of)?;
            let text_of = |key: &str| {
                item.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Some(Testimonial::new(
                text_of("author"),
                text_of("text"),
                rating.round() as i64,
            ))
        })
        .collect();

    Ok(Some(testimonials))
}

// ============================================================================
// TESTS
// ============================================================================
