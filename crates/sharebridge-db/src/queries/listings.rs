use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use sharebridge_types::models::{Listing, ListingStatus};

use super::page_params;
use crate::Database;
use crate::filter::{SearchFilter, WhereClause, rank_by_distance};
use crate::models::{enum_col, point_cols, split_point, uuid_col};

const LISTING_SELECT: &str = "SELECT l.id, l.user_id, u.name, l.title, l.description, l.category, l.status,
            l.image_url, l.address, l.latitude, l.longitude, l.created_at, l.updated_at
     FROM listings l
     JOIN users u ON u.id = l.user_id";

fn listing_from_row(row: &Row) -> rusqlite::Result<Listing> {
    Ok(Listing {
        id: uuid_col(row, 0)?,
        owner_id: uuid_col(row, 1)?,
        owner_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        category: enum_col(row, 5)?,
        status: enum_col(row, 6)?,
        image_url: row.get(7)?,
        address: row.get(8)?,
        location: point_cols(row, 9)?,
        distance_km: None,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl Database {
    pub fn insert_listing(&self, listing: &Listing) -> Result<()> {
        let (latitude, longitude) = split_point(listing.location);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO listings (id, user_id, title, description, category, status, image_url,
                                       address, latitude, longitude, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    listing.id.to_string(),
                    listing.owner_id.to_string(),
                    listing.title,
                    listing.description,
                    listing.category.as_str(),
                    listing.status.as_str(),
                    listing.image_url,
                    listing.address,
                    latitude,
                    longitude,
                    listing.created_at,
                    listing.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        self.with_conn(|conn| {
            let listing = conn
                .query_row(
                    &format!("{LISTING_SELECT} WHERE l.id = ?1"),
                    [id.to_string()],
                    listing_from_row,
                )
                .optional()?;
            Ok(listing)
        })
    }

    /// Overwrites every editable column. Concurrent edits: last write wins.
    pub fn update_listing(&self, listing: &Listing) -> Result<bool> {
        let (latitude, longitude) = split_point(listing.location);
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE listings SET title = ?2, description = ?3, category = ?4, status = ?5,
                                     image_url = ?6, address = ?7, latitude = ?8, longitude = ?9,
                                     updated_at = ?10
                 WHERE id = ?1",
                params![
                    listing.id.to_string(),
                    listing.title,
                    listing.description,
                    listing.category.as_str(),
                    listing.status.as_str(),
                    listing.image_url,
                    listing.address,
                    latitude,
                    longitude,
                    listing.updated_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn update_listing_status(&self, id: Uuid, status: ListingStatus, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE listings SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), now],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_listing(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM listings WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Filtered, paginated search. With `filter.near` set the result is
    /// ordered by distance and every item carries `distance_km`; otherwise
    /// newest first.
    pub fn search_listings(&self, filter: &SearchFilter<ListingStatus>) -> Result<(Vec<Listing>, u64)> {
        let clause = WhereClause::for_search(
            "l",
            filter.category,
            filter.status.map(|s| s.as_str()),
            filter.owner_id,
            filter.text.as_deref(),
            filter.near.as_ref(),
        );
        let where_sql = clause.sql();

        self.with_conn(|conn| {
            if let Some(near) = &filter.near {
                let mut stmt = conn.prepare(&format!("{LISTING_SELECT} {where_sql}"))?;
                let candidates = stmt
                    .query_map(params_from_iter(clause.params.iter()), listing_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                return Ok(rank_by_distance(candidates, near, &filter.page));
            }

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM listings l {where_sql}"),
                params_from_iter(clause.params.iter()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{LISTING_SELECT} {where_sql}
                 ORDER BY l.created_at DESC, l.rowid DESC
                 LIMIT ? OFFSET ?"
            ))?;
            let items = stmt
                .query_map(params_from_iter(page_params(clause.params.clone(), &filter.page)), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((items, total as u64))
        })
    }

    pub fn count_listings_by_status(&self) -> Result<Vec<(ListingStatus, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM listings GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((enum_col(row, 0)?, row.get::<_, i64>(1)? as u64)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
