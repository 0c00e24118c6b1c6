use std::collections::HashMap;

use serde::Serialize;

/// One push notification addressed by device token.
///
/// `data` is a flat string→string mapping — the shape every mobile push
/// provider accepts without payload transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub data: HashMap<String, String>,
}
