use serde::Deserialize;
use uuid::Uuid;

/// Body for `POST /invitations`. `type` is `server` or `list`.
#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub list_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub code: String,
}
