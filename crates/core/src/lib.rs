pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod geo;
pub mod notify;
pub mod ports;
pub mod selection;
pub mod text;

pub use cache::{
    ConversationCache, ConversationCompletionHook, ConversationSyncBackend,
    InMemoryConversationStore, LocalConversationStore, StoreError,
};
pub use domain::analysis::{
    ConversationAnalysis, ConversationMetrics, ConversationReport, CustomerIntent,
};
pub use domain::conversation::{
    CachedConversation, CallId, CallMetadata, CallMetadataPatch, CallStatus, ConversationTurn,
    ExtractedBusinessData, Speaker, SyncStatus,
};
pub use domain::order::{Order, OrderId, OrderStatus, Priority};
pub use domain::trigger::{TriggerPoint, TriggerPointId, TriggerType};
pub use domain::vendor::{Coordinates, ServiceCategory, VendorId, VendorProfile, VendorStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extraction::BusinessDataExtractor;
pub use notify::{NotificationChannel, NotificationDispatcher, NotificationSender};
pub use selection::{DispatchOutcome, DispatchRequest, DispatchService, VendorSelectionEngine};
