use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

use crate::domain::account::{Account, AccountId, FolderId};
use crate::domain::message::{MessageId, MessageSnapshot, MessageType, StatusFlags};
use crate::store::repo::MailStore;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS accounts (
                id             INTEGER PRIMARY KEY,
                name           TEXT NOT NULL,
                icon           TEXT NOT NULL,
                enabled        INTEGER NOT NULL,
                mail_services  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sync_folders (
                account_id  INTEGER NOT NULL,
                folder_id   INTEGER NOT NULL,
                PRIMARY KEY (account_id, folder_id)
            );

            CREATE TABLE IF NOT EXISTS messages (
                id               INTEGER PRIMARY KEY,
                account_id       INTEGER NOT NULL,
                folder_id        INTEGER NOT NULL,
                message_type     TEXT NOT NULL,
                status           INTEGER NOT NULL,
                from_header      TEXT NOT NULL,
                subject          TEXT NOT NULL,
                date_epoch       INTEGER NOT NULL,
                recipient_count  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS messages_account ON messages(account_id);
            "#,
        )?;
        Ok(())
    }

    // Writer side. The notifier only reads; these are for the mail client
    // that owns the database, and for seeding it in tests.

    pub fn upsert_account(&self, account: &Account) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO accounts (id, name, icon, enabled, mail_services)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
              name=excluded.name,
              icon=excluded.icon,
              enabled=excluded.enabled,
              mail_services=excluded.mail_services
            "#,
            params![
                account.id.0 as i64,
                account.name,
                account.icon,
                account.enabled,
                account.mail_services
            ],
        )?;
        tx.execute(
            "DELETE FROM sync_folders WHERE account_id=?1",
            params![account.id.0 as i64],
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO sync_folders (account_id, folder_id) VALUES (?1, ?2)")?;
            for folder in &account.folders_to_sync {
                stmt.execute(params![account.id.0 as i64, folder.0 as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn remove_account(&self, id: AccountId) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM accounts WHERE id=?1", params![id.0 as i64])?;
        tx.execute(
            "DELETE FROM sync_folders WHERE account_id=?1",
            params![id.0 as i64],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE account_id=?1",
            params![id.0 as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_message(&self, m: &MessageSnapshot) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO messages (id, account_id, folder_id, message_type, status,
                                  from_header, subject, date_epoch, recipient_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
              account_id=excluded.account_id,
              folder_id=excluded.folder_id,
              message_type=excluded.message_type,
              status=excluded.status,
              from_header=excluded.from_header,
              subject=excluded.subject,
              date_epoch=excluded.date_epoch,
              recipient_count=excluded.recipient_count
            "#,
            params![
                m.id.0 as i64,
                m.account_id.0 as i64,
                m.folder_id.0 as i64,
                m.message_type.as_str(),
                m.status.0,
                m.from,
                m.subject,
                m.date.timestamp(),
                m.recipient_count
            ],
        )?;
        Ok(())
    }

    pub fn remove_message(&self, id: MessageId) -> Result<()> {
        self.conn
            .execute("DELETE FROM messages WHERE id=?1", params![id.0 as i64])?;
        Ok(())
    }
}

impl MailStore for SqliteStore {
    fn enabled_accounts(&self) -> Result<HashSet<AccountId>> {
        let mut stmt = self
            .conn
            .prepare(r#"SELECT id FROM accounts WHERE enabled=1 AND mail_services>0"#)?;
        let mut rows = stmt.query([])?;
        let mut out = HashSet::new();
        while let Some(r) = rows.next()? {
            out.insert(AccountId(r.get::<_, i64>(0)? as u64));
        }
        Ok(out)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = self
            .conn
            .query_row(
                r#"SELECT name, icon, enabled, mail_services FROM accounts WHERE id=?1"#,
                params![id.0 as i64],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, bool>(2)?,
                        r.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, icon, enabled, mail_services)) = row else {
            return Ok(None);
        };

        Ok(Some(Account {
            id,
            name,
            icon,
            enabled,
            mail_services,
            folders_to_sync: self.folders_to_sync(id)?,
        }))
    }

    fn folders_to_sync(&self, id: AccountId) -> Result<HashSet<FolderId>> {
        let mut stmt = self
            .conn
            .prepare(r#"SELECT folder_id FROM sync_folders WHERE account_id=?1"#)?;
        let mut rows = stmt.query(params![id.0 as i64])?;
        let mut out = HashSet::new();
        while let Some(r) = rows.next()? {
            out.insert(FolderId(r.get::<_, i64>(0)? as u64));
        }
        Ok(out)
    }

    fn snapshot(&self, id: MessageId) -> Result<Option<MessageSnapshot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT account_id, folder_id, message_type, status, from_header,
                   subject, date_epoch, recipient_count
            FROM messages WHERE id=?1
            "#,
        )?;

        let mut rows = stmt.query(params![id.0 as i64])?;
        if let Some(r) = rows.next()? {
            let message_type: String = r.get(2)?;
            let date_epoch: i64 = r.get(6)?;
            Ok(Some(MessageSnapshot {
                id,
                account_id: AccountId(r.get::<_, i64>(0)? as u64),
                folder_id: FolderId(r.get::<_, i64>(1)? as u64),
                message_type: MessageType::parse(&message_type),
                status: StatusFlags(r.get(3)?),
                from: r.get(4)?,
                subject: r.get(5)?,
                date: DateTime::<Utc>::from_timestamp(date_epoch, 0).unwrap_or_default(),
                recipient_count: r.get(7)?,
            }))
        } else {
            Ok(None)
        }
    }

    fn count_queued_outbox(&self, id: AccountId) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE account_id=?1 AND (status & ?2) != 0 AND (status & ?3) = 0
            "#,
            params![
                id.0 as i64,
                StatusFlags::OUTBOX.0,
                StatusFlags::TRASH.0
            ],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    fn mark_as_read(&self, id: MessageId) -> Result<()> {
        self.conn.execute(
            r#"UPDATE messages SET status = status | ?2 WHERE id=?1"#,
            params![id.0 as i64, StatusFlags::READ.0],
        )?;
        Ok(())
    }
}
