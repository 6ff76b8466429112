use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use crate::core::db::Timestamp;

pub const PROJECTS: &str = "projects";
pub const ATTENDEES: &str = "attendees";

/// Status written for every attendee check-in.
pub const CHECKED_IN: &str = "Checked In";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub description: String,
}

/// Screenshot entries are either a bare URL or a captioned image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    Url(String),
    Detail(ImageDetail),
}

impl ImageRef {
    pub fn url(&self) -> &str {
        match self {
            ImageRef::Url(url) => url,
            ImageRef::Detail(detail) => &detail.url,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabMode {
    #[default]
    Gallery,
    Tech,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTab {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: TabMode,
    #[serde(default)]
    pub images: Vec<ImageDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Active,
    Completed,
    Pending,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProjectStatus::Active => "Active",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Pending => "Pending",
        };
        f.write_str(label)
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "pending" => Ok(ProjectStatus::Pending),
            _ => Err(format!("Invalid project status: {value}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub is_confidential: bool,
    #[serde(default)]
    pub tech_frontend: String,
    #[serde(default)]
    pub tech_database: String,
    #[serde(default)]
    pub tech_deployment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_core: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Vec<ImageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture_images: Option<Vec<ImageRef>>,
    #[serde(default)]
    pub tabs: Vec<ProjectTab>,
    /// Assigned by the store on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl Project {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(untitled)")
    }
}

/// Fields to change on a project; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_confidential: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_frontend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_deployment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_core: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Vec<ImageRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture_images: Option<Vec<ImageRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<ProjectTab>>,
}

impl ProjectUpdate {
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = Some(name.clone());
        }
        if let Some(status) = self.status {
            project.status = Some(status);
        }
        if let Some(is_confidential) = self.is_confidential {
            project.is_confidential = is_confidential;
        }
        if let Some(tech_frontend) = &self.tech_frontend {
            project.tech_frontend = tech_frontend.clone();
        }
        if let Some(tech_database) = &self.tech_database {
            project.tech_database = tech_database.clone();
        }
        if let Some(tech_deployment) = &self.tech_deployment {
            project.tech_deployment = tech_deployment.clone();
        }
        if let Some(tech_core) = &self.tech_core {
            project.tech_core = Some(tech_core.clone());
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(screenshots) = &self.screenshots {
            project.screenshots = Some(screenshots.clone());
        }
        if let Some(architecture_images) = &self.architecture_images {
            project.architecture_images = Some(architecture_images.clone());
        }
        if let Some(tabs) = &self.tabs {
            project.tabs = tabs.clone();
        }
    }

    /// Undo [`ProjectUpdate::apply_to`] on `project`, restoring values from `before`.
    ///
    /// A field is only restored while it still holds the value this update
    /// wrote, so changes made by later updates are kept.
    pub fn revert_on(&self, project: &mut Project, before: &Project) {
        if let Some(name) = &self.name {
            if project.name.as_ref() == Some(name) {
                project.name = before.name.clone();
            }
        }
        if let Some(status) = self.status {
            if project.status == Some(status) {
                project.status = before.status;
            }
        }
        if let Some(is_confidential) = self.is_confidential {
            if project.is_confidential == is_confidential {
                project.is_confidential = before.is_confidential;
            }
        }
        if let Some(tech_frontend) = &self.tech_frontend {
            if &project.tech_frontend == tech_frontend {
                project.tech_frontend = before.tech_frontend.clone();
            }
        }
        if let Some(tech_database) = &self.tech_database {
            if &project.tech_database == tech_database {
                project.tech_database = before.tech_database.clone();
            }
        }
        if let Some(tech_deployment) = &self.tech_deployment {
            if &project.tech_deployment == tech_deployment {
                project.tech_deployment = before.tech_deployment.clone();
            }
        }
        if let Some(tech_core) = &self.tech_core {
            if project.tech_core.as_ref() == Some(tech_core) {
                project.tech_core = before.tech_core.clone();
            }
        }
        if let Some(description) = &self.description {
            if &project.description == description {
                project.description = before.description.clone();
            }
        }
        if let Some(screenshots) = &self.screenshots {
            if project.screenshots.as_ref() == Some(screenshots) {
                project.screenshots = before.screenshots.clone();
            }
        }
        if let Some(architecture_images) = &self.architecture_images {
            if project.architecture_images.as_ref() == Some(architecture_images) {
                project.architecture_images = before.architecture_images.clone();
            }
        }
        if let Some(tabs) = &self.tabs {
            if &project.tabs == tabs {
                project.tabs = before.tabs.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub picture_url: String,
    #[serde(default)]
    pub status: String,
    /// Assigned by the store at check-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckInPayload {
    pub user_id: String,
    pub display_name: String,
    pub picture_url: Option<String>,
}
