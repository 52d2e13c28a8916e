//! OrderedCollection against real tables in an in-memory database.

use sqlx::SqlitePool;
use yellowstone_events::open_pool;
use yellowstone_state::ordering::{duplicate_task, OrderedCollection, Slot};
use yellowstone_state::schema;

async fn test_pool() -> SqlitePool {
    let pool = open_pool("sqlite::memory:", 1).await.unwrap();
    schema::migrate(&pool).await.unwrap();
    pool
}

async fn insert_list(pool: &SqlitePool, title: &str, position: i64) -> i64 {
    sqlx::query("INSERT INTO task_list_v1 (title, category, archived, position) VALUES (?1, 'toDoList', FALSE, ?2)")
        .bind(title)
        .bind(position)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn insert_task(pool: &SqlitePool, title: &str) -> i64 {
    sqlx::query("INSERT INTO task_v1 (title) VALUES (?1)")
        .bind(title)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn members(pool: &SqlitePool, collection: OrderedCollection) -> Vec<i64> {
    let mut conn = pool.acquire().await.unwrap();
    collection
        .load(&mut conn)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.member)
        .collect()
}

async fn positions(pool: &SqlitePool, collection: OrderedCollection) -> Vec<Slot> {
    let mut conn = pool.acquire().await.unwrap();
    collection.load(&mut conn).await.unwrap()
}

/// A list with tasks A, B, C, D appended in order.
async fn list_of_four(pool: &SqlitePool) -> (OrderedCollection, [i64; 4]) {
    let list = insert_list(pool, "Groceries", 1).await;
    let collection = OrderedCollection::list_tasks(list);
    let mut ids = [0; 4];
    for (i, title) in ["A", "B", "C", "D"].iter().enumerate() {
        ids[i] = insert_task(pool, title).await;
    }

    // Single-connection pool: hold the connection only after the inserts.
    let mut conn = pool.acquire().await.unwrap();
    for id in ids {
        assert!(collection.append(&mut conn, id).await.unwrap());
    }
    (collection, ids)
}

#[tokio::test]
async fn append_places_members_at_the_end() {
    let pool = test_pool().await;
    let (collection, ids) = list_of_four(&pool).await;

    let slots = positions(&pool, collection).await;
    assert_eq!(
        slots,
        ids.iter()
            .enumerate()
            .map(|(i, &m)| Slot::new(m, i as i64 + 1))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn append_existing_member_is_noop() {
    let pool = test_pool().await;
    let (collection, [a, ..]) = list_of_four(&pool).await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(!collection.append(&mut conn, a).await.unwrap());
    drop(conn);
    assert_eq!(positions(&pool, collection).await.len(), 4);
}

#[tokio::test]
async fn reorder_after_writes_new_order() {
    let pool = test_pool().await;
    let (collection, [a, b, c, d]) = list_of_four(&pool).await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(collection.reorder_after(&mut conn, d, Some(a)).await.unwrap());
    drop(conn);
    assert_eq!(members(&pool, collection).await, vec![a, d, b, c]);

    let mut conn = pool.acquire().await.unwrap();
    assert!(collection.reorder_after(&mut conn, c, None).await.unwrap());
    drop(conn);
    assert_eq!(members(&pool, collection).await, vec![c, a, d, b]);
}

#[tokio::test]
async fn reorder_absent_member_changes_nothing() {
    let pool = test_pool().await;
    let (collection, [a, b, c, d]) = list_of_four(&pool).await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(!collection.reorder_after(&mut conn, 999, Some(a)).await.unwrap());
    assert!(!collection.reorder_after(&mut conn, b, Some(b)).await.unwrap());
    drop(conn);
    assert_eq!(members(&pool, collection).await, vec![a, b, c, d]);
}

#[tokio::test]
async fn repair_renumbers_duplicates_in_relative_order() {
    let pool = test_pool().await;
    let (collection, [a, b, c, d]) = list_of_four(&pool).await;

    // Collapse B and C onto A's position, push D far out.
    sqlx::query("UPDATE task_to_list_v1 SET position = 1 WHERE task_id IN (?1, ?2)")
        .bind(b)
        .bind(c)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE task_to_list_v1 SET position = 40 WHERE task_id = ?1")
        .bind(d)
        .execute(&pool)
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let repaired = collection.repair(&mut conn).await.unwrap();
    drop(conn);

    assert_eq!(
        repaired,
        vec![Slot::new(a, 1), Slot::new(b, 2), Slot::new(c, 3), Slot::new(d, 4)]
    );
    assert_eq!(positions(&pool, collection).await, repaired);

    // Idempotent.
    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(collection.repair(&mut conn).await.unwrap(), repaired);
}

#[tokio::test]
async fn move_appends_after_destination_max() {
    let pool = test_pool().await;
    let (from, [a, b, ..]) = list_of_four(&pool).await;

    let other = insert_list(&pool, "Hardware", 2).await;
    let to = OrderedCollection::list_tasks(other);
    let x = insert_task(&pool, "X").await;
    sqlx::query("INSERT INTO task_to_list_v1 (task_id, list_id, position) VALUES (?1, ?2, 7)")
        .bind(x)
        .bind(other)
        .execute(&pool)
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    assert!(from.move_to(&mut conn, b, &to).await.unwrap());
    drop(conn);

    assert!(!members(&pool, from).await.contains(&b));
    assert_eq!(positions(&pool, to).await, vec![Slot::new(x, 7), Slot::new(b, 8)]);
    assert!(members(&pool, from).await.contains(&a));
}

#[tokio::test]
async fn remove_absent_member_is_noop() {
    let pool = test_pool().await;
    let (collection, _) = list_of_four(&pool).await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(!collection.remove(&mut conn, 12345).await.unwrap());
}

#[tokio::test]
async fn task_lists_are_an_unscoped_collection() {
    let pool = test_pool().await;
    let one = insert_list(&pool, "One", 1).await;
    let two = insert_list(&pool, "Two", 2).await;
    let three = insert_list(&pool, "Three", 3).await;
    let lists = OrderedCollection::task_lists();

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(lists.next_position(&mut conn).await.unwrap(), 4);
    assert!(lists.reorder_after(&mut conn, three, Some(one)).await.unwrap());
    assert!(lists.append(&mut conn, 99).await.is_err());
    drop(conn);

    assert_eq!(members(&pool, lists).await, vec![one, three, two]);
}

#[tokio::test]
async fn duplicate_copies_title_and_due_date_but_not_completion() {
    let pool = test_pool().await;
    let list = insert_list(&pool, "Groceries", 1).await;
    let target = OrderedCollection::list_tasks(list);

    let source = sqlx::query(
        "INSERT INTO task_v1 (title, due_date, completed_at) VALUES ('Milk', '2025-03-01T09:00:00+00:00', '2025-02-01T09:00:00+00:00')",
    )
    .execute(&pool)
    .await
    .unwrap()
    .last_insert_rowid();

    let mut conn = pool.acquire().await.unwrap();
    let copy = duplicate_task(&mut conn, source, &target).await.unwrap().unwrap();
    assert_ne!(copy, source);
    assert_eq!(duplicate_task(&mut conn, 4242, &target).await.unwrap(), None);
    drop(conn);

    let (title, due, completed): (String, Option<String>, Option<String>) =
        sqlx::query_as("SELECT title, due_date, completed_at FROM task_v1 WHERE id = ?1")
            .bind(copy)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(title, "Milk");
    assert_eq!(due.as_deref(), Some("2025-03-01T09:00:00+00:00"));
    assert_eq!(completed, None);
    assert_eq!(members(&pool, target).await, vec![copy]);
}
