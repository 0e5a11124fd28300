//! Accounts and their role-specific extras

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Account type, stored by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Student,
    Recruiter,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Recruiter => "Recruiter",
            Self::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" => Ok(Self::Student),
            "Recruiter" => Ok(Self::Recruiter),
            "Admin" => Ok(Self::Admin),
            other => Err(ValidationError::InvalidVariant {
                field: "role",
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and identity of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub salt: String,
    pub role: Role,
}

/// Public face of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uuid: Uuid,
    pub username: String,
    pub role: Role,
}

/// A [`User`] joined with whichever role table holds a row for it.
///
/// Recruiter fields are `None` for non-recruiters and `points` is `None`
/// until the account has earned any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(flatten)]
    pub user: User,
    pub organisation_name: Option<String>,
    pub application_status: Option<bool>,
    pub points: Option<i64>,
}

impl UserRecord {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            uuid: self.user.uuid,
            username: self.user.username.clone(),
            role: self.user.role,
        }
    }
}

/// Points balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPoints {
    #[serde(flatten)]
    pub info: UserInfo,
    pub points: i64,
}

/// Profile of a student with the tags they like and dislike.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    #[serde(rename = "studentID")]
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub description: Option<String>,
    #[serde(rename = "profilePic")]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub tags_liked: Vec<String>,
    #[serde(default)]
    pub tags_disliked: Vec<String>,
}
