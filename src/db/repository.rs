//! Generic record access.
//!
//! The free functions take a `&mut SqliteConnection` so they run the same way on a
//! pooled connection or inside a transaction (`&mut *tx`). The [`Db`] methods are
//! the one-shot versions: acquire, run, release.
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, sqlite::SqliteRow};

use super::{Db, Filter, StoreError, StoreResult, Value};

/// A table-backed record with an integer key.
pub trait Entity: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin + 'static {
    /// Table name.
    const TABLE: &'static str;
    /// Name used in error messages.
    const NAME: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    /// Column/value pairs written on insert and update, excluding the key.
    fn columns(&self) -> Vec<(&'static str, Value)>;
}

/// A record holding a reference to a parent `P`, so `P` can be included when
/// loading it.
pub trait BelongsTo<P: Entity>: Entity {
    fn parent_id(&self) -> i64;
}

pub(crate) async fn fetch_many<T: Entity>(
    conn: &mut SqliteConnection,
    filter: Filter,
) -> StoreResult<Vec<T>> {
    let mut qb = select::<T>(filter);
    Ok(qb.build_query_as::<T>().fetch_all(&mut *conn).await?)
}

pub(crate) async fn fetch_one<T: Entity>(
    conn: &mut SqliteConnection,
    filter: Filter,
) -> StoreResult<Option<T>> {
    let mut qb = select::<T>(filter);
    qb.push(" LIMIT 1");
    Ok(qb.build_query_as::<T>().fetch_optional(&mut *conn).await?)
}

pub(crate) async fn fetch_by_id<T: Entity>(
    conn: &mut SqliteConnection,
    id: i64,
) -> StoreResult<Option<T>> {
    fetch_one(conn, Filter::eq("id", id)).await
}

/// Like [`fetch_by_id`], but a missing row is an error.
pub(crate) async fn require<T: Entity>(conn: &mut SqliteConnection, id: i64) -> StoreResult<T> {
    fetch_by_id(conn, id)
        .await?
        .ok_or_else(|| StoreError::missing::<T>(id))
}

/// Load every matching `T` together with its parent `P`, if it still exists.
pub(crate) async fn fetch_many_including<T, P>(
    conn: &mut SqliteConnection,
    filter: Filter,
) -> StoreResult<Vec<(T, Option<P>)>>
where
    T: BelongsTo<P>,
    P: Entity + Clone,
{
    let children: Vec<T> = fetch_many(conn, filter).await?;

    let mut parent_ids: Vec<i64> = children.iter().map(BelongsTo::<P>::parent_id).collect();
    parent_ids.sort_unstable();
    parent_ids.dedup();
    let parents: Vec<P> = fetch_many(conn, Filter::is_in("id", parent_ids)).await?;

    Ok(children
        .into_iter()
        .map(|child| {
            let parent_id = BelongsTo::<P>::parent_id(&child);
            let parent = parents.iter().find(|p| p.id() == parent_id).cloned();
            (child, parent)
        })
        .collect())
}

/// Insert `record` and assign it the generated key. Returns the affected row count.
pub(crate) async fn insert<T: Entity>(conn: &mut SqliteConnection, record: &mut T) -> StoreResult<u64> {
    let columns = record.columns();

    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        T::TABLE,
        names.join(", ")
    ));
    for (i, (_, value)) in columns.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        value.push_bind(&mut qb);
    }
    qb.push(")");

    let done = qb.build().execute(&mut *conn).await?;
    record.set_id(done.last_insert_rowid());
    Ok(done.rows_affected())
}

/// Overwrite every column of the row keyed by `record.id()`.
pub(crate) async fn update<T: Entity>(conn: &mut SqliteConnection, record: &T) -> StoreResult<u64> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", T::TABLE));
    for (i, (name, value)) in record.columns().into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(name).push(" = ");
        value.push_bind(&mut qb);
    }
    qb.push(" WHERE id = ").push_bind(record.id());

    Ok(qb.build().execute(&mut *conn).await?.rows_affected())
}

pub(crate) async fn delete_by_id<T: Entity>(conn: &mut SqliteConnection, id: i64) -> StoreResult<u64> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE id = ", T::TABLE));
    qb.push_bind(id);
    Ok(qb.build().execute(&mut *conn).await?.rows_affected())
}

fn select<T: Entity>(filter: Filter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE ", T::TABLE));
    filter.push_sql(&mut qb);
    qb
}

impl Db {
    pub async fn get_many<T: Entity>(&self, filter: Filter) -> StoreResult<Vec<T>> {
        let mut conn = self.pool().acquire().await?;
        fetch_many(&mut conn, filter).await
    }

    pub async fn get_many_including<T, P>(&self, filter: Filter) -> StoreResult<Vec<(T, Option<P>)>>
    where
        T: BelongsTo<P>,
        P: Entity + Clone,
    {
        let mut conn = self.pool().acquire().await?;
        fetch_many_including(&mut conn, filter).await
    }

    pub async fn get_one<T: Entity>(&self, filter: Filter) -> StoreResult<Option<T>> {
        let mut conn = self.pool().acquire().await?;
        fetch_one(&mut conn, filter).await
    }

    pub async fn get_by_id<T: Entity>(&self, id: i64) -> StoreResult<Option<T>> {
        let mut conn = self.pool().acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    pub async fn insert<T: Entity>(&self, record: &mut T) -> StoreResult<u64> {
        let mut conn = self.pool().acquire().await?;
        insert(&mut conn, record).await
    }

    pub async fn update<T: Entity>(&self, record: &T) -> StoreResult<u64> {
        let mut conn = self.pool().acquire().await?;
        update(&mut conn, record).await
    }

    pub async fn delete<T: Entity>(&self, record: &T) -> StoreResult<u64> {
        self.delete_by_id::<T>(record.id()).await
    }

    pub async fn delete_by_id<T: Entity>(&self, id: i64) -> StoreResult<u64> {
        let mut conn = self.pool().acquire().await?;
        delete_by_id::<T>(&mut conn, id).await
    }
}
