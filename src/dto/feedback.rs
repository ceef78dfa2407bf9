use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Feedback, OrderStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitFeedbackRequest {
    pub feedback: String,
    /// Defaults to 5.
    pub rating: Option<i16>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFeedbackRequest {
    pub feedback: Option<String>,
    pub rating: Option<i16>,
}

/// Order fields shown next to a feedback entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSummary {
    pub status: OrderStatus,
    pub total_price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackDetail {
    #[serde(flatten)]
    pub feedback: Feedback,
    /// `None` when the order has since been deleted.
    pub order: Option<OrderSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackList {
    pub items: Vec<FeedbackDetail>,
}
