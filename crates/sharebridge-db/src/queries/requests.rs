use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use sharebridge_types::models::{DonationRequest, RequestStatus};

use super::page_params;
use crate::Database;
use crate::filter::{SearchFilter, WhereClause, rank_by_distance};
use crate::models::{enum_col, point_cols, split_point, uuid_col};

const REQUEST_SELECT: &str = "SELECT r.id, r.user_id, u.name, r.title, r.description, r.category, r.quantity,
            r.status, r.address, r.latitude, r.longitude, r.created_at, r.updated_at
     FROM requests r
     JOIN users u ON u.id = r.user_id";

fn request_from_row(row: &Row) -> rusqlite::Result<DonationRequest> {
    Ok(DonationRequest {
        id: uuid_col(row, 0)?,
        owner_id: uuid_col(row, 1)?,
        owner_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        category: enum_col(row, 5)?,
        quantity: row.get(6)?,
        status: enum_col(row, 7)?,
        address: row.get(8)?,
        location: point_cols(row, 9)?,
        distance_km: None,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl Database {
    pub fn insert_request(&self, request: &DonationRequest) -> Result<()> {
        let (latitude, longitude) = split_point(request.location);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO requests (id, user_id, title, description, category, quantity, status,
                                       address, latitude, longitude, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    request.id.to_string(),
                    request.owner_id.to_string(),
                    request.title,
                    request.description,
                    request.category.as_str(),
                    request.quantity,
                    request.status.as_str(),
                    request.address,
                    latitude,
                    longitude,
                    request.created_at,
                    request.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_request(&self, id: Uuid) -> Result<Option<DonationRequest>> {
        self.with_conn(|conn| {
            let request = conn
                .query_row(
                    &format!("{REQUEST_SELECT} WHERE r.id = ?1"),
                    [id.to_string()],
                    request_from_row,
                )
                .optional()?;
            Ok(request)
        })
    }

    /// Overwrites every editable column. Concurrent edits: last write wins.
    pub fn update_request(&self, request: &DonationRequest) -> Result<bool> {
        let (latitude, longitude) = split_point(request.location);
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE requests SET title = ?2, description = ?3, category = ?4, quantity = ?5,
                                     status = ?6, address = ?7, latitude = ?8, longitude = ?9,
                                     updated_at = ?10
                 WHERE id = ?1",
                params![
                    request.id.to_string(),
                    request.title,
                    request.description,
                    request.category.as_str(),
                    request.quantity,
                    request.status.as_str(),
                    request.address,
                    latitude,
                    longitude,
                    request.updated_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn update_request_status(&self, id: Uuid, status: RequestStatus, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE requests SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), now],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_request(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM requests WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Same contract as [`Database::search_listings`].
    pub fn search_requests(&self, filter: &SearchFilter<RequestStatus>) -> Result<(Vec<DonationRequest>, u64)> {
        let clause = WhereClause::for_search(
            "r",
            filter.category,
            filter.status.map(|s| s.as_str()),
            filter.owner_id,
            filter.text.as_deref(),
            filter.near.as_ref(),
        );
        let where_sql = clause.sql();

        self.with_conn(|conn| {
            if let Some(near) = &filter.near {
                let mut stmt = conn.prepare(&format!("{REQUEST_SELECT} {where_sql}"))?;
                let candidates = stmt
                    .query_map(params_from_iter(clause.params.iter()), request_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                return Ok(rank_by_distance(candidates, near, &filter.page));
            }

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM requests r {where_sql}"),
                params_from_iter(clause.params.iter()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{REQUEST_SELECT} {where_sql}
                 ORDER BY r.created_at DESC, r.rowid DESC
                 LIMIT ? OFFSET ?"
            ))?;
            let items = stmt
                .query_map(params_from_iter(page_params(clause.params.clone(), &filter.page)), request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((items, total as u64))
        })
    }

    pub fn count_requests_by_status(&self) -> Result<Vec<(RequestStatus, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM requests GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((enum_col(row, 0)?, row.get::<_, i64>(1)? as u64)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
