mod listings;
mod logs;
mod messages;
mod requests;
mod users;

use rusqlite::types::Value;

use crate::filter::PageRequest;

/// Appends LIMIT/OFFSET placeholders' values for `page`.
fn page_params(mut params: Vec<Value>, page: &PageRequest) -> Vec<Value> {
    params.push(Value::Integer(page.limit as i64));
    params.push(Value::Integer(page.offset() as i64));
    params
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use sharebridge_types::geo::Point;
    use sharebridge_types::models::Role;

    use crate::{Database, NewUser};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, name: &str, role: Role, location: Option<Point>) -> Uuid {
        let id = Uuid::new_v4();
        let created = db.create_user(
            &NewUser {
                id,
                email: format!("{}@example.org", name.to_lowercase()),
                password_hash: "hash".into(),
                name: name.into(),
                phone: None,
                address: None,
                role,
                location,
                is_verified: true,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(created, "duplicate test user {name}");
        id
    }
}
