//! Authorization module - role table, tenant context and access filter
//!
//! This module implements the document visibility engine:
//! - Closed role and permission enums with a total role -> permission table
//! - Per-request `TenantContext` resolved from the tenant directory
//! - The access filter shared by list, direct-fetch and answer composition paths
//! - Super admin bypass carried as an explicit flag, never inferred from empty scopes

mod caller;
mod context;
mod filter;
mod resolver;

pub use caller::Caller;
pub use context::TenantContext;
pub use filter::{AccessChecked, AccessFilter, HasDocumentRef};
pub use resolver::TenantContextResolver;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Privilege level. Variants are declared from least to most privileged so the
/// derived ordering gives `SuperAdmin > AccountAdmin > ProjectAdmin > EndUser`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EndUser,
    ProjectAdmin,
    AccountAdmin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::SuperAdmin,
        Role::AccountAdmin,
        Role::ProjectAdmin,
        Role::EndUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::AccountAdmin => "account_admin",
            Role::ProjectAdmin => "project_admin",
            Role::EndUser => "end_user",
        }
    }

    /// Permission set granted by this role.
    pub fn permissions(self) -> &'static [Permission] {
        use Permission::*;

        match self {
            Role::SuperAdmin => &[
                ManageClients,
                ManageUsers,
                ManageSystem,
                ViewClient,
                ManageProjects,
                ViewProject,
                ManageDocuments,
                UploadDocuments,
                ApproveDocuments,
                DeleteDocuments,
                ViewDocuments,
                ChatWithDocuments,
                DownloadDocuments,
            ],
            // manage_users and manage_projects only apply inside assigned clients
            Role::AccountAdmin => &[
                ViewClient,
                ManageUsers,
                ManageProjects,
                ViewProject,
                ViewDocuments,
                ChatWithDocuments,
            ],
            Role::ProjectAdmin => &[
                ViewProject,
                ManageDocuments,
                UploadDocuments,
                ApproveDocuments,
                DeleteDocuments,
                ViewDocuments,
                ChatWithDocuments,
                DownloadDocuments,
            ],
            Role::EndUser => &[ViewProject, ViewDocuments, ChatWithDocuments],
        }
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "account_admin" => Ok(Role::AccountAdmin),
            "project_admin" => Ok(Role::ProjectAdmin),
            "end_user" => Ok(Role::EndUser),
            other => Err(AppError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// A single grantable capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // System
    ManageClients,
    ManageUsers,
    ManageSystem,

    // Client
    ViewClient,
    ManageProjects,

    // Project
    ViewProject,
    ManageDocuments,
    UploadDocuments,
    ApproveDocuments,
    DeleteDocuments,

    // Document
    ViewDocuments,
    ChatWithDocuments,
    DownloadDocuments,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageClients => "manage_clients",
            Permission::ManageUsers => "manage_users",
            Permission::ManageSystem => "manage_system",
            Permission::ViewClient => "view_client",
            Permission::ManageProjects => "manage_projects",
            Permission::ViewProject => "view_project",
            Permission::ManageDocuments => "manage_documents",
            Permission::UploadDocuments => "upload_documents",
            Permission::ApproveDocuments => "approve_documents",
            Permission::DeleteDocuments => "delete_documents",
            Permission::ViewDocuments => "view_documents",
            Permission::ChatWithDocuments => "chat_with_documents",
            Permission::DownloadDocuments => "download_documents",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
