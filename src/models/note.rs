use serde::{Deserialize, Serialize};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Note {
    pub id: i32,
    pub title: String,
    pub content: Option<String>,
    pub user_id: i32,
    pub file_url: Option<String>,
}
