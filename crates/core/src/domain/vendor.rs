use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::text::{find_phrase, normalize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VendorId(pub String);

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Categories of home service a vendor can be dispatched for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    AcRepair,
    Plumbing,
    Electrical,
    Cleaning,
    Painting,
    Carpentry,
    Landscaping,
    Roofing,
    PestControl,
    Handyman,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 10] = [
        Self::AcRepair,
        Self::Plumbing,
        Self::Electrical,
        Self::Cleaning,
        Self::Painting,
        Self::Carpentry,
        Self::Landscaping,
        Self::Roofing,
        Self::PestControl,
        Self::Handyman,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcRepair => "ac_repair",
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Cleaning => "cleaning",
            Self::Painting => "painting",
            Self::Carpentry => "carpentry",
            Self::Landscaping => "landscaping",
            Self::Roofing => "roofing",
            Self::PestControl => "pest_control",
            Self::Handyman => "handyman",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::AcRepair => "AC repair",
            Self::Plumbing => "Plumbing",
            Self::Electrical => "Electrical",
            Self::Cleaning => "Cleaning",
            Self::Painting => "Painting",
            Self::Carpentry => "Carpentry",
            Self::Landscaping => "Landscaping",
            Self::Roofing => "Roofing",
            Self::PestControl => "Pest control",
            Self::Handyman => "Handyman",
        }
    }

    /// Lowercase phrases that name this category, used both for vendor
    /// service labels and for spotting the request in a transcript.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            Self::AcRepair => &[
                "ac repair",
                "ac",
                "a/c",
                "air conditioning",
                "air conditioner",
                "hvac",
                "cooling",
            ],
            Self::Plumbing => &[
                "plumbing",
                "plumber",
                "leak",
                "leaking",
                "pipe",
                "pipes",
                "drain",
                "clogged",
                "water heater",
                "toilet",
                "faucet",
            ],
            Self::Electrical => &[
                "electrical",
                "electrician",
                "electric",
                "wiring",
                "outlet",
                "circuit breaker",
                "breaker",
            ],
            Self::Cleaning => &[
                "cleaning",
                "cleaner",
                "house cleaning",
                "deep cleaning",
                "maid",
                "janitorial",
            ],
            Self::Painting => &["painting", "painter", "paint"],
            Self::Carpentry => &["carpentry", "carpenter", "woodwork", "cabinet", "cabinets"],
            Self::Landscaping => &["landscaping", "landscaper", "lawn", "gardening", "yard"],
            Self::Roofing => &["roofing", "roofer", "roof", "shingles"],
            Self::PestControl => &["pest control", "exterminator", "pest", "termites", "rodent"],
            Self::Handyman => &["handyman", "odd jobs", "general repairs"],
        }
    }

    /// Maps a vendor's service label onto a category through the synonym
    /// table. The label must equal a synonym or the category slug.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = normalize(label);
        if label.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|category| {
            normalize(category.as_str()) == label
                || category.synonyms().iter().any(|synonym| *synonym == label)
        })
    }

    /// Finds the category mentioned earliest in free text. Ties on position
    /// go to the category declared first.
    pub fn detect(text: &str) -> Option<Self> {
        let haystack = text.to_lowercase();
        Self::ALL
            .into_iter()
            .filter_map(|category| {
                category
                    .synonyms()
                    .iter()
                    .filter_map(|synonym| find_phrase(&haystack, synonym))
                    .min()
                    .map(|position| (position, category))
            })
            .min_by_key(|(position, category)| (*position, *category))
            .map(|(_, category)| category)
    }

    /// Typical job value used to estimate an order before a quote exists.
    pub fn base_value(self) -> Decimal {
        match self {
            Self::AcRepair => Decimal::from(250),
            Self::Plumbing => Decimal::from(200),
            Self::Electrical => Decimal::from(225),
            Self::Cleaning => Decimal::from(150),
            Self::Painting => Decimal::from(400),
            Self::Carpentry => Decimal::from(300),
            Self::Landscaping => Decimal::from(175),
            Self::Roofing => Decimal::from(500),
            Self::PestControl => Decimal::from(150),
            Self::Handyman => Decimal::from(120),
        }
    }
}

impl std::fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Verified,
    Pending,
    Blocked,
}

impl VendorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Pending => "pending",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "verified" => Some(Self::Verified),
            "pending" => Some(Self::Pending),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceArea {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_miles: f64,
}

impl ServiceArea {
    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default = "enabled")]
    pub email: bool,
    #[serde(default)]
    pub sms: bool,
    #[serde(default = "enabled")]
    pub push: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self { email: true, sms: false, push: true }
    }
}

fn enabled() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorProfile {
    pub id: VendorId,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
    pub status: VendorStatus,
    pub services: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub service_area: ServiceArea,
    pub active_orders: u32,
    pub max_capacity: u32,
    pub average_response_time_mins: f64,
    /// Star rating in `[0, 5]`.
    pub rating: f64,
    pub is_online: bool,
    /// Fraction in `[0, 1]`.
    pub completion_rate: f64,
    /// Fraction in `[0, 1]`.
    pub cancellation_rate: f64,
    pub membership_months: u32,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
}

impl VendorProfile {
    pub fn offers(&self, category: ServiceCategory) -> bool {
        self.services.iter().any(|label| ServiceCategory::from_label(label) == Some(category))
    }

    pub fn has_capacity(&self) -> bool {
        self.active_orders < self.max_capacity
    }
}
