use std::collections::HashMap;

use chrono::NaiveDate;
use rolodex_types::models::{Contact, ContactChannel};
use rusqlite::Connection;
use rusqlite::types::ToSql;
use tracing::debug;

use crate::dates::birthday_window;
use crate::models::{
    CONTACT_COLUMNS, ChannelValue, ContactFields, ContactFilter, LINK_COLUMNS, contact_from_row,
    link_from_row,
};
use crate::{Database, OptionalExt, StoreError, placeholders};

/// Every contact query below carries `c.created_by = owner` in its WHERE
/// clause. A contact owned by someone else is simply not found.
impl Database {
    pub fn list_contacts(
        &self,
        owner: i64,
        filter: &ContactFilter,
    ) -> Result<Vec<Contact>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT DISTINCT {}
                 FROM contacts c
                 LEFT JOIN contact_channels cc ON cc.contact_id = c.id
                 WHERE c.created_by = ?1
                   AND (?2 IS NULL OR c.first_name = ?2)
                   AND (?3 IS NULL OR c.last_name = ?3)
                   AND (?4 IS NULL OR cc.channel_value = ?4)
                 ORDER BY c.id",
                CONTACT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let contacts = stmt
                .query_map(
                    rusqlite::params![
                        owner,
                        filter.first_name,
                        filter.last_name,
                        filter.channel_value
                    ],
                    contact_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            attach_channels(conn, contacts)
        })
    }

    /// Contacts whose birthday falls within `days` days of `today`.
    pub fn list_contacts_by_birthday(
        &self,
        owner: i64,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<Contact>, StoreError> {
        let window = birthday_window(today, days);
        debug!("Birthday window from {} (+{} days): {} calendar days", today, days, window.len());

        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {} FROM contacts c WHERE c.created_by = ?1 AND c.birthdate IS NOT NULL",
                CONTACT_COLUMNS
            );
            let keys = if window.is_full_year() {
                Vec::new()
            } else {
                window.month_day_keys()
            };
            if !keys.is_empty() {
                sql.push_str(&format!(
                    " AND strftime('%m-%d', c.birthdate) IN ({})",
                    placeholders(2, keys.len())
                ));
            }
            sql.push_str(" ORDER BY c.id");

            let mut params: Vec<&dyn ToSql> = Vec::with_capacity(keys.len() + 1);
            params.push(&owner);
            params.extend(keys.iter().map(|k| k as &dyn ToSql));

            let mut stmt = conn.prepare(&sql)?;
            let contacts = stmt
                .query_map(params.as_slice(), contact_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            attach_channels(conn, contacts)
        })
    }

    pub fn get_contact(&self, owner: i64, id: i64) -> Result<Option<Contact>, StoreError> {
        self.with_conn(|conn| query_contact(conn, owner, id))
    }

    /// Stores a new contact owned by `owner`, along with its channel values.
    /// A taken value fails with `Conflict`, an unknown channel with
    /// `NotFound`; either way nothing is written.
    pub fn create_contact(&self, owner: i64, fields: &ContactFields) -> Result<Contact, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO contacts (first_name, last_name, birthdate, gender, persuasion, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    fields.first_name,
                    fields.last_name,
                    fields.birthdate,
                    fields.gender,
                    fields.persuasion,
                    owner
                ],
            )?;
            let id = tx.last_insert_rowid();
            insert_links(&tx, id, &fields.channels)?;

            let contact = query_contact(&tx, owner, id)?
                .ok_or_else(|| StoreError::Database(anyhow::anyhow!("inserted contact vanished")))?;
            tx.commit()?;
            Ok(contact)
        })
    }

    /// Full replace of the contact's fields and channel values. `None` when
    /// the contact is absent or not owned by `owner`.
    pub fn update_contact(
        &self,
        owner: i64,
        id: i64,
        fields: &ContactFields,
    ) -> Result<Option<Contact>, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE contacts
                 SET first_name = ?3, last_name = ?4, birthdate = ?5, gender = ?6, persuasion = ?7
                 WHERE id = ?1 AND created_by = ?2",
                rusqlite::params![
                    id,
                    owner,
                    fields.first_name,
                    fields.last_name,
                    fields.birthdate,
                    fields.gender,
                    fields.persuasion
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            tx.execute("DELETE FROM contact_channels WHERE contact_id = ?1", [id])?;
            insert_links(&tx, id, &fields.channels)?;

            let contact = query_contact(&tx, owner, id)?;
            tx.commit()?;
            Ok(contact)
        })
    }

    pub fn delete_contact(&self, owner: i64, id: i64) -> Result<Option<Contact>, StoreError> {
        self.with_conn(|conn| {
            let Some(contact) = query_contact(conn, owner, id)? else {
                return Ok(None);
            };
            conn.execute(
                "DELETE FROM contacts WHERE id = ?1 AND created_by = ?2",
                (id, owner),
            )?;
            Ok(Some(contact))
        })
    }
}

pub(crate) fn query_contact(
    conn: &Connection,
    owner: i64,
    id: i64,
) -> Result<Option<Contact>, StoreError> {
    let sql = format!(
        "SELECT {} FROM contacts c WHERE c.id = ?1 AND c.created_by = ?2",
        CONTACT_COLUMNS
    );
    let contact = conn.query_row(&sql, (id, owner), contact_from_row).optional()?;
    match contact {
        Some(contact) => Ok(attach_channels(conn, vec![contact])?.pop()),
        None => Ok(None),
    }
}

/// Batch-fetch channel values for a set of contacts and attach them.
fn attach_channels(conn: &Connection, mut contacts: Vec<Contact>) -> Result<Vec<Contact>, StoreError> {
    if contacts.is_empty() {
        return Ok(contacts);
    }

    let ids: Vec<i64> = contacts.iter().map(|c| c.id).collect();
    let sql = format!(
        "SELECT {}
         FROM contact_channels cc
         JOIN channels ch ON ch.id = cc.channel_id
         WHERE cc.contact_id IN ({})
         ORDER BY cc.id",
        LINK_COLUMNS,
        placeholders(1, ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    let links = stmt
        .query_map(params.as_slice(), link_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_contact: HashMap<i64, Vec<ContactChannel>> = HashMap::new();
    for link in links {
        by_contact.entry(link.contact_id).or_default().push(link);
    }
    for contact in &mut contacts {
        contact.channels = by_contact.remove(&contact.id).unwrap_or_default();
    }

    Ok(contacts)
}

fn insert_links(conn: &Connection, contact_id: i64, values: &[ChannelValue]) -> Result<(), StoreError> {
    for value in values {
        if crate::channels::query_channel(conn, value.channel_id)?.is_none() {
            return Err(StoreError::NotFound);
        }
        conn.execute(
            "INSERT INTO contact_channels (contact_id, channel_id, channel_value) VALUES (?1, ?2, ?3)",
            (contact_id, value.channel_id, &value.channel_value),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    struct Fixture {
        db: Database,
        alice: i64,
        bob: i64,
        email: i64,
        phone: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for address in ["alice@x.com", "bob@x.com"] {
            let user = db
                .create_user(&NewUser {
                    email: address.to_string(),
                    username: address.to_string(),
                    password_hash: "hash".to_string(),
                    avatar: None,
                })
                .unwrap();
            ids.push(user.id);
        }
        let email = db.create_channel("email").unwrap().id;
        let phone = db.create_channel("phone").unwrap().id;
        Fixture { db, alice: ids[0], bob: ids[1], email, phone }
    }

    fn fields(first: &str, last: &str) -> ContactFields {
        ContactFields {
            first_name: first.to_string(),
            last_name: last.to_string(),
            gender: "female".to_string(),
            persuasion: "friend".to_string(),
            ..ContactFields::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn create_then_get_returns_same_fields() {
        let f = fixture();
        let mut input = fields("Ada", "Lovelace");
        input.birthdate = Some(date(1815, 12, 10));
        input.channels = vec![ChannelValue { channel_id: f.email, channel_value: "ada@x.com".into() }];

        let created = f.db.create_contact(f.alice, &input).unwrap();
        assert!(created.id > 0);
        assert_eq!(created.first_name, "Ada");
        assert_eq!(created.last_name, "Lovelace");
        assert_eq!(created.birthdate, Some(date(1815, 12, 10)));
        assert_eq!(created.gender, "female");
        assert_eq!(created.persuasion, "friend");
        assert_eq!(created.created_by, f.alice);
        assert_eq!(created.channels.len(), 1);
        assert_eq!(created.channels[0].channel_name, "email");
        assert_eq!(created.channels[0].channel_value, "ada@x.com");

        assert_eq!(f.db.get_contact(f.alice, created.id).unwrap(), Some(created));
    }

    #[test]
    fn other_owners_see_nothing() {
        let f = fixture();
        let contact = f.db.create_contact(f.alice, &fields("Ada", "Lovelace")).unwrap();

        assert!(f.db.get_contact(f.alice, contact.id).unwrap().is_some());
        assert!(f.db.get_contact(f.bob, contact.id).unwrap().is_none());
        assert!(f.db.update_contact(f.bob, contact.id, &fields("X", "Y")).unwrap().is_none());
        assert!(f.db.delete_contact(f.bob, contact.id).unwrap().is_none());
        assert!(f.db.list_contacts(f.bob, &ContactFilter::default()).unwrap().is_empty());

        // Untouched by the failed attempts.
        let still = f.db.get_contact(f.alice, contact.id).unwrap().unwrap();
        assert_eq!(still.first_name, "Ada");
    }

    #[test]
    fn list_filters_are_anded() {
        let f = fixture();
        f.db.create_contact(f.alice, &fields("Ada", "Lovelace")).unwrap();
        f.db.create_contact(f.alice, &fields("Ada", "Byron")).unwrap();
        f.db.create_contact(f.alice, &fields("Alan", "Turing")).unwrap();

        let all = f.db.list_contacts(f.alice, &ContactFilter::default()).unwrap();
        assert_eq!(all.len(), 3);

        let adas = f
            .db
            .list_contacts(f.alice, &ContactFilter { first_name: Some("Ada".into()), ..Default::default() })
            .unwrap();
        assert_eq!(adas.len(), 2);

        let one = f
            .db
            .list_contacts(
                f.alice,
                &ContactFilter {
                    first_name: Some("Ada".into()),
                    last_name: Some("Byron".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].last_name, "Byron");
    }

    #[test]
    fn email_filter_uses_outer_join() {
        let f = fixture();
        let mut with_email = fields("Ada", "Lovelace");
        with_email.channels = vec![
            ChannelValue { channel_id: f.email, channel_value: "a@x.com".into() },
            ChannelValue { channel_id: f.phone, channel_value: "+100".into() },
        ];
        let linked = f.db.create_contact(f.alice, &with_email).unwrap();
        f.db.create_contact(f.alice, &fields("Alan", "Turing")).unwrap();

        let filtered = f
            .db
            .list_contacts(f.alice, &ContactFilter { channel_value: Some("a@x.com".into()), ..Default::default() })
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, linked.id);
        assert_eq!(filtered[0].channels.len(), 2);

        // Without the filter the channel-less contact shows up, and the
        // two-channel contact is not duplicated by the join.
        let all = f.db.list_contacts(f.alice, &ContactFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn update_replaces_everything() {
        let f = fixture();
        let mut input = fields("Ada", "Lovelace");
        input.channels = vec![ChannelValue { channel_id: f.email, channel_value: "ada@x.com".into() }];
        let contact = f.db.create_contact(f.alice, &input).unwrap();

        let mut replacement = fields("Augusta", "King");
        replacement.birthdate = Some(date(1815, 12, 10));
        replacement.channels = vec![ChannelValue { channel_id: f.phone, channel_value: "+44".into() }];
        let updated = f.db.update_contact(f.alice, contact.id, &replacement).unwrap().unwrap();

        assert_eq!(updated.id, contact.id);
        assert_eq!(updated.first_name, "Augusta");
        assert_eq!(updated.birthdate, Some(date(1815, 12, 10)));
        assert_eq!(updated.channels.len(), 1);
        assert_eq!(updated.channels[0].channel_value, "+44");
    }

    #[test]
    fn failed_channel_insert_rolls_back() {
        let f = fixture();
        let mut first = fields("Ada", "Lovelace");
        first.channels = vec![ChannelValue { channel_id: f.email, channel_value: "taken@x.com".into() }];
        let ada = f.db.create_contact(f.alice, &first).unwrap();

        let mut dup = fields("Alan", "Turing");
        dup.channels = vec![ChannelValue { channel_id: f.email, channel_value: "taken@x.com".into() }];
        assert!(matches!(f.db.create_contact(f.bob, &dup), Err(StoreError::Conflict(_))));
        assert!(f.db.list_contacts(f.bob, &ContactFilter::default()).unwrap().is_empty());

        let mut unknown = fields("Ada", "Renamed");
        unknown.channels = vec![ChannelValue { channel_id: 9_999, channel_value: "new@x.com".into() }];
        assert!(matches!(
            f.db.update_contact(f.alice, ada.id, &unknown),
            Err(StoreError::NotFound)
        ));
        let unchanged = f.db.get_contact(f.alice, ada.id).unwrap().unwrap();
        assert_eq!(unchanged.last_name, "Lovelace");
        assert_eq!(unchanged.channels[0].channel_value, "taken@x.com");
    }

    #[test]
    fn delete_returns_the_removed_contact() {
        let f = fixture();
        let contact = f.db.create_contact(f.alice, &fields("Ada", "Lovelace")).unwrap();
        let deleted = f.db.delete_contact(f.alice, contact.id).unwrap().unwrap();
        assert_eq!(deleted, contact);
        assert!(f.db.get_contact(f.alice, contact.id).unwrap().is_none());
        assert!(f.db.delete_contact(f.alice, contact.id).unwrap().is_none());
    }

    #[test]
    fn birthday_window_query() {
        let f = fixture();
        let mut names = Vec::new();
        for (name, birthdate) in [
            ("newyear", Some(date(1990, 1, 2))),
            ("boxing", Some(date(1985, 12, 26))),
            ("eve", Some(date(2000, 12, 31))),
            ("none", None),
        ] {
            let mut input = fields(name, "X");
            input.birthdate = birthdate;
            f.db.create_contact(f.alice, &input).unwrap();
            names.push(name);
        }
        let mut foreign = fields("foreign", "X");
        foreign.birthdate = Some(date(1990, 1, 1));
        f.db.create_contact(f.bob, &foreign).unwrap();

        let found = f.db.list_contacts_by_birthday(f.alice, date(2026, 12, 28), 7).unwrap();
        let found: Vec<_> = found.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(found, vec!["newyear", "eve"]);

        let everyone = f.db.list_contacts_by_birthday(f.alice, date(2026, 12, 28), 400).unwrap();
        assert_eq!(everyone.len(), 3);
    }

    #[test]
    fn leap_day_birthdays_show_on_march_first() {
        let f = fixture();
        let mut leapling = fields("Leap", "Ling");
        leapling.birthdate = Some(date(2000, 2, 29));
        f.db.create_contact(f.alice, &leapling).unwrap();

        assert_eq!(f.db.list_contacts_by_birthday(f.alice, date(2027, 3, 1), 0).unwrap().len(), 1);
        assert_eq!(f.db.list_contacts_by_birthday(f.alice, date(2028, 3, 1), 0).unwrap().len(), 0);
        assert_eq!(f.db.list_contacts_by_birthday(f.alice, date(2028, 2, 29), 0).unwrap().len(), 1);
    }

    #[test]
    fn deleting_an_owner_removes_their_contacts() {
        let f = fixture();
        let contact = f.db.create_contact(f.alice, &fields("Ada", "Lovelace")).unwrap();
        f.db.delete_user_by_email("alice@x.com").unwrap().unwrap();
        assert!(f.db.get_contact(f.alice, contact.id).unwrap().is_none());
    }
}
