//! Positional ordering over integer `position` columns.
//!
//! Planning is pure ([`plan`]) and works on [`Slot`] snapshots. The storage
//! side ([`OrderedCollection`]) loads a snapshot, plans, and writes back only
//! the rows whose position changed. The same code orders tasks within a list
//! (membership rows) and the task lists themselves (entity rows).

use anyhow::{bail, Result};
use sqlx::SqliteConnection;
use tracing::debug;

/// One member and its stored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub member: i64,
    pub position: i64,
}

impl Slot {
    pub fn new(member: i64, position: i64) -> Self {
        Self { member, position }
    }
}

pub mod plan {
    use std::collections::HashMap;

    use super::Slot;

    /// Position for a member appended at the end: `max + 1`, or 1 when empty.
    pub fn next_position(slots: &[Slot]) -> i64 {
        slots.iter().map(|s| s.position).max().unwrap_or(0) + 1
    }

    /// Renumber to `1..=N`, ordered by `(position, member)`.
    pub fn normalized(slots: &[Slot]) -> Vec<Slot> {
        let mut sorted = slots.to_vec();
        sorted.sort_by_key(|s| (s.position, s.member));
        sorted
            .iter()
            .enumerate()
            .map(|(i, s)| Slot::new(s.member, i as i64 + 1))
            .collect()
    }

    /// Place `member` directly after `after`, or at the front when `after` is
    /// `None` or not in the collection. The result is normalized.
    ///
    /// An absent `member`, or `after == Some(member)`, leaves the order as is.
    pub fn reorder(slots: &[Slot], member: i64, after: Option<i64>) -> Vec<Slot> {
        let current = normalized(slots);
        if after == Some(member) || !current.iter().any(|s| s.member == member) {
            return current;
        }

        let mut order: Vec<i64> = current
            .iter()
            .map(|s| s.member)
            .filter(|&m| m != member)
            .collect();

        let index = after
            .and_then(|a| order.iter().position(|&m| m == a))
            .map_or(0, |i| i + 1);
        order.insert(index, member);

        order
            .into_iter()
            .enumerate()
            .map(|(i, m)| Slot::new(m, i as i64 + 1))
            .collect()
    }

    /// Slots of `after` whose position differs from the same member in `before`.
    pub fn changes(before: &[Slot], after: &[Slot]) -> Vec<Slot> {
        let old: HashMap<i64, i64> = before.iter().map(|s| (s.member, s.position)).collect();
        after
            .iter()
            .filter(|s| old.get(&s.member) != Some(&s.position))
            .copied()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Storage adapter
// ---------------------------------------------------------------------------

/// Where a collection's positions live.
#[derive(Debug)]
pub struct PositionTable {
    pub table: &'static str,
    pub member_column: &'static str,
    /// Column identifying which collection a row belongs to. `None` when the
    /// whole table is one collection.
    pub scope_column: Option<&'static str>,
}

/// Tasks within a list.
pub const TASK_MEMBERSHIP: PositionTable = PositionTable {
    table: "task_to_list_v1",
    member_column: "task_id",
    scope_column: Some("list_id"),
};

/// The global order of task lists.
pub const TASK_LISTS: PositionTable = PositionTable {
    table: "task_list_v1",
    member_column: "id",
    scope_column: None,
};

/// One ordered collection: a `PositionTable`, narrowed to a scope if scoped.
#[derive(Debug, Clone, Copy)]
pub struct OrderedCollection {
    table: &'static PositionTable,
    scope: Option<i64>,
}

impl OrderedCollection {
    /// The tasks of one list.
    pub fn list_tasks(list_id: i64) -> Self {
        Self {
            table: &TASK_MEMBERSHIP,
            scope: Some(list_id),
        }
    }

    /// All task lists.
    pub fn task_lists() -> Self {
        Self {
            table: &TASK_LISTS,
            scope: None,
        }
    }

    /// Predicate selecting this collection. Every statement binds the scope
    /// as `?1`, NULL when the table is unscoped.
    fn in_scope(&self) -> String {
        match self.table.scope_column {
            Some(col) => format!("{col} = ?1"),
            None => "?1 IS NULL".to_string(),
        }
    }

    /// Current members in stored order, ties broken by member id.
    pub async fn load(&self, conn: &mut SqliteConnection) -> Result<Vec<Slot>> {
        let t = self.table;
        let sql = format!(
            "SELECT {member}, position FROM {table} WHERE {scope} ORDER BY position, {member}",
            member = t.member_column,
            table = t.table,
            scope = self.in_scope(),
        );

        let rows = sqlx::query_as::<_, (i64, i64)>(&sql)
            .bind(self.scope)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.into_iter().map(|(m, p)| Slot::new(m, p)).collect())
    }

    pub async fn next_position(&self, conn: &mut SqliteConnection) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM {table} WHERE {scope}",
            table = self.table.table,
            scope = self.in_scope(),
        );

        let next = sqlx::query_scalar::<_, i64>(&sql)
            .bind(self.scope)
            .fetch_one(&mut *conn)
            .await?;
        Ok(next)
    }

    /// Add `member` at the end. Returns `false` if it was already present.
    ///
    /// Only membership collections can append; entity rows carry their own
    /// position from insert time (see [`next_position`](Self::next_position)).
    pub async fn append(&self, conn: &mut SqliteConnection, member: i64) -> Result<bool> {
        let (Some(scope_column), Some(scope)) = (self.table.scope_column, self.scope) else {
            bail!("{} is not a membership table", self.table.table);
        };
        let t = self.table;
        let sql = format!(
            "INSERT INTO {table} ({member}, {scope_column}, position) \
             VALUES (?2, ?1, (SELECT COALESCE(MAX(position), 0) + 1 FROM {table} WHERE {scope_column} = ?1)) \
             ON CONFLICT DO NOTHING",
            table = t.table,
            member = t.member_column,
        );

        let result = sqlx::query(&sql)
            .bind(scope)
            .bind(member)
            .execute(&mut *conn)
            .await?;

        let added = result.rows_affected() > 0;
        debug!(table = t.table, scope, member, added, "Append");
        Ok(added)
    }

    /// Remove `member`. Returns `false` if it was not present.
    pub async fn remove(&self, conn: &mut SqliteConnection, member: i64) -> Result<bool> {
        let t = self.table;
        let sql = format!(
            "DELETE FROM {} WHERE {} AND {} = ?2",
            t.table,
            self.in_scope(),
            t.member_column
        );

        let result = sqlx::query(&sql)
            .bind(self.scope)
            .bind(member)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove `member` from this collection, then append it to `to`.
    pub async fn move_to(&self, conn: &mut SqliteConnection, member: i64, to: &OrderedCollection) -> Result<bool> {
        self.remove(conn, member).await?;
        to.append(conn, member).await
    }

    /// Renumber positions to `1..=N`. Returns the repaired snapshot.
    pub async fn repair(&self, conn: &mut SqliteConnection) -> Result<Vec<Slot>> {
        let before = self.load(conn).await?;
        let after = plan::normalized(&before);
        self.write(conn, &plan::changes(&before, &after)).await?;
        Ok(after)
    }

    /// Repair, then place `member` after `after` (front when `None`).
    /// Returns `false` when the order did not change.
    pub async fn reorder_after(
        &self,
        conn: &mut SqliteConnection,
        member: i64,
        after: Option<i64>,
    ) -> Result<bool> {
        let current = self.repair(conn).await?;
        let planned = plan::reorder(&current, member, after);
        let changed = plan::changes(&current, &planned);
        self.write(conn, &changed).await?;
        Ok(!changed.is_empty())
    }

    async fn write(&self, conn: &mut SqliteConnection, slots: &[Slot]) -> Result<()> {
        if slots.is_empty() {
            return Ok(());
        }
        let t = self.table;
        let sql = format!(
            "UPDATE {} SET position = ?3 WHERE {} AND {} = ?2",
            t.table,
            self.in_scope(),
            t.member_column
        );

        for slot in slots {
            sqlx::query(&sql)
                .bind(self.scope)
                .bind(slot.member)
                .bind(slot.position)
                .execute(&mut *conn)
                .await?;
        }
        debug!(table = t.table, scope = ?self.scope, rows = slots.len(), "Positions written");
        Ok(())
    }
}

/// Copy a task (title and due date, completion cleared) and append the copy
/// to `target`. Returns the new task id, or `None` if the source is gone.
pub async fn duplicate_task(
    conn: &mut SqliteConnection,
    source_task_id: i64,
    target: &OrderedCollection,
) -> Result<Option<i64>> {
    let new_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO task_v1 (title, due_date, completed_at)
        SELECT title, due_date, NULL FROM task_v1 WHERE id = ?1
        RETURNING id
        "#,
    )
    .bind(source_task_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(new_id) = new_id else {
        debug!(source_task_id, "Duplicate source missing");
        return Ok(None);
    };

    target.append(conn, new_id).await?;
    Ok(Some(new_id))
}
