//! Query-string shapes and reference-point resolution shared by the
//! listing and request search endpoints.

use serde::Deserialize;
use uuid::Uuid;

use sharebridge_db::{PageRequest, Proximity, SearchFilter};
use sharebridge_types::api::Paginated;
use sharebridge_types::geo::{DEFAULT_RADIUS_KM, Point, validate_radius};
use sharebridge_types::models::Category;

use crate::error::ApiError;
use crate::middleware::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

/// `GET /listings`, `GET /requests`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery<S> {
    pub category: Option<Category>,
    pub status: Option<S>,
    pub owner_id: Option<Uuid>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl<S> SearchQuery<S> {
    pub fn into_filter(self) -> SearchFilter<S> {
        SearchFilter {
            category: self.category,
            status: self.status,
            owner_id: self.owner_id,
            text: self.q,
            near: None,
            page: PageRequest::new(self.page, self.limit),
        }
    }
}

/// `GET /listings/nearby`, `GET /requests/nearby`.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery<S> {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub category: Option<Category>,
    pub status: Option<S>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl<S> NearbyQuery<S> {
    /// Builds the proximity filter. `default_status` applies when the caller
    /// names none.
    pub fn into_filter(self, caller: &AuthUser, default_status: S) -> Result<SearchFilter<S>, ApiError> {
        let center = reference_point(self.lat, self.lng, caller.location)?;
        let radius_km = self.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        validate_radius(radius_km)?;

        Ok(SearchFilter {
            category: self.category,
            status: Some(self.status.unwrap_or(default_status)),
            owner_id: None,
            text: None,
            near: Some(Proximity { center, radius_km }),
            page: PageRequest::new(self.page, self.limit),
        })
    }
}

/// Explicit coordinates win; otherwise the caller's stored profile location.
pub fn reference_point(lat: Option<f64>, lng: Option<f64>, profile: Option<Point>) -> Result<Point, ApiError> {
    match (lat, lng) {
        (Some(latitude), Some(longitude)) => Ok(Point::new(latitude, longitude)?),
        (None, None) => profile.ok_or_else(|| {
            ApiError::bad_request("no coordinates supplied and no location stored on your profile")
        }),
        _ => Err(ApiError::bad_request("lat and lng must be supplied together")),
    }
}

pub fn paginated<T>(items: Vec<T>, total: u64, page: &PageRequest) -> Paginated<T> {
    Paginated {
        items,
        total,
        page: page.page,
        limit: page.limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharebridge_types::models::{ListingStatus, Role};

    fn caller(location: Option<Point>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "c@example.org".into(),
            name: "C".into(),
            role: Role::Acceptor,
            location,
        }
    }

    fn nearby(lat: Option<f64>, lng: Option<f64>, radius_km: Option<f64>) -> NearbyQuery<ListingStatus> {
        NearbyQuery {
            lat,
            lng,
            radius_km,
            category: None,
            status: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn explicit_coordinates_win_over_profile() {
        let home = Point::new(10.0, 10.0).unwrap();
        let point = reference_point(Some(1.0), Some(2.0), Some(home)).unwrap();
        assert_eq!(point, Point::new(1.0, 2.0).unwrap());
    }

    #[test]
    fn falls_back_to_profile_location() {
        let home = Point::new(10.0, 10.0).unwrap();
        assert_eq!(reference_point(None, None, Some(home)).unwrap(), home);
        assert!(reference_point(None, None, None).is_err());
    }

    #[test]
    fn half_a_coordinate_is_rejected() {
        assert!(reference_point(Some(1.0), None, None).is_err());
        assert!(reference_point(None, Some(1.0), None).is_err());
        assert!(reference_point(Some(100.0), Some(1.0), None).is_err());
    }

    #[test]
    fn nearby_filter_defaults() {
        let home = Point::new(48.2, 16.37).unwrap();
        let filter = nearby(None, None, None)
            .into_filter(&caller(Some(home)), ListingStatus::Active)
            .unwrap();
        let near = filter.near.unwrap();
        assert_eq!(near.center, home);
        assert_eq!(near.radius_km, DEFAULT_RADIUS_KM);
        assert_eq!(filter.status, Some(ListingStatus::Active));
    }

    #[test]
    fn nearby_rejects_bad_radius() {
        let result = nearby(Some(0.0), Some(0.0), Some(0.0)).into_filter(&caller(None), ListingStatus::Active);
        assert!(result.is_err());
    }
}
