//! Serde-deserializable types matching Discogs API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::pages::Paged;
use super::types::{CollectionItem, Folder, MasterRelease};

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPageLinks {
  pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPagination {
  #[serde(default)]
  pub page: u64,
  #[serde(default)]
  pub pages: u64,
  #[serde(default)]
  pub per_page: u64,
  #[serde(default)]
  pub items: u64,
  #[serde(default)]
  pub urls: ApiPageLinks,
}

// ============================================================================
// Collection folders endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiFolder {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiFoldersResponse {
  #[serde(default)]
  pub folders: Vec<ApiFolder>,
}

// ============================================================================
// Collection items endpoint
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ApiArtist {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFormat {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBasicInformation {
  pub id: u64,
  /// 0 when the release has no master record.
  #[serde(default)]
  pub master_id: i64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub year: u32,
  #[serde(default)]
  pub cover_image: String,
  #[serde(default)]
  pub thumb: String,
  #[serde(default)]
  pub formats: Vec<ApiFormat>,
  #[serde(default)]
  pub artists: Vec<ApiArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRelease {
  pub instance_id: u64,
  pub id: u64,
  #[serde(default)]
  pub date_added: String,
  pub basic_information: ApiBasicInformation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCollectionItems {
  #[serde(default)]
  pub pagination: ApiPagination,
  #[serde(default)]
  pub releases: Vec<ApiRelease>,
}

impl Paged for ApiCollectionItems {
  fn next_link(&self) -> Option<String> {
    self.pagination.urls.next.clone()
  }

  fn merge(&mut self, later: Self) {
    self.releases.extend(later.releases);
    self.pagination = later.pagination;
  }

  fn collapse(&mut self) {
    let total = self.releases.len() as u64;
    self.pagination = ApiPagination {
      page: 1,
      pages: 1,
      per_page: total,
      items: total,
      urls: ApiPageLinks::default(),
    };
  }
}

// ============================================================================
// Master release endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiMasterRelease {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub year: u32,
  #[serde(default)]
  pub artists: Vec<ApiArtist>,
  #[serde(default)]
  pub genres: Vec<String>,
  #[serde(default)]
  pub styles: Vec<String>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiRelease {
  pub fn into_item(self) -> CollectionItem {
    let info = self.basic_information;
    CollectionItem {
      instance_id: self.instance_id,
      release_id: info.id,
      // Non-positive means no master record exists; such items are never
      // the subject of a metadata fetch.
      master_id: (info.master_id > 0).then_some(info.master_id as u64),
      title: info.title,
      year: info.year,
      artists: info.artists.into_iter().map(|a| a.name).collect(),
      formats: info.formats.into_iter().map(|f| f.name).collect(),
      cover_image: if info.cover_image.is_empty() {
        info.thumb
      } else {
        info.cover_image
      },
      date_added: self.date_added,
      master_year: None,
    }
  }
}

impl From<ApiFolder> for Folder {
  fn from(folder: ApiFolder) -> Self {
    Folder {
      id: folder.id,
      name: folder.name,
      count: folder.count,
    }
  }
}

impl From<ApiMasterRelease> for MasterRelease {
  fn from(master: ApiMasterRelease) -> Self {
    MasterRelease {
      id: master.id,
      title: master.title,
      year: master.year,
      artists: master.artists.into_iter().map(|a| a.name).collect(),
      genres: master.genres,
      styles: master.styles,
    }
  }
}
