//! Featured titles shown on the landing page.
use chrono::{Months, Utc};
use serde::Deserialize;
use tracing::info;

use crate::{
    Result,
    db::{Db, Filter, StoreError},
    models::FeaturedTitle,
    validation,
};

#[derive(Deserialize, Debug, Clone)]
pub struct NewFeatured {
    pub description: String,
    /// Path of an already uploaded image, relative to the upload directory.
    pub image_path: String,
}

/// Featured titles that have not expired yet.
pub async fn active_featured(db: &Db) -> Result<Vec<FeaturedTitle>> {
    Ok(db.get_many(Filter::gt("expiry", Utc::now())).await?)
}

/// Every featured title, expired ones included.
pub async fn all_featured(db: &Db) -> Result<Vec<FeaturedTitle>> {
    Ok(db.get_many(Filter::All).await?)
}

/// Feature a title for `lifetime_months` months from now.
pub async fn create_featured(db: &Db, input: NewFeatured, lifetime_months: u32) -> Result<FeaturedTitle> {
    validation::feature_description(&input.description)?;
    validation::image_path(&input.image_path)?;

    let now = Utc::now();
    let expiry = now
        .checked_add_months(Months::new(lifetime_months))
        .ok_or_else(|| anyhow::anyhow!("featured title expiry out of range"))?;

    let mut featured = FeaturedTitle {
        id: 0,
        description: input.description,
        image_path: input.image_path,
        expiry,
    };
    _ = db.insert(&mut featured).await?;

    info!(featured = featured.id, %expiry, "title featured");
    Ok(featured)
}

pub async fn delete_featured(db: &Db, id: i64) -> Result<()> {
    if db.delete_by_id::<FeaturedTitle>(id).await? == 0 {
        return Err(StoreError::missing::<FeaturedTitle>(id).into());
    }
    info!(featured = id, "featured title removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Duration;

    use super::*;
    use crate::tests::test_db;

    fn poster(description: &str) -> NewFeatured {
        NewFeatured {
            description: description.to_owned(),
            image_path: "posters/heat.jpg".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_active_excludes_expired() {
        let (_dir, db) = test_db().await;

        let live = create_featured(&db, poster("Heat"), 1).await.unwrap();
        assert!(live.expiry > Utc::now() + Duration::days(27));

        let mut expired = FeaturedTitle {
            id: 0,
            description: "Old".to_owned(),
            image_path: "posters/old.png".to_owned(),
            expiry: Utc::now() - Duration::days(1),
        };
        db.insert(&mut expired).await.unwrap();

        let active = active_featured(&db).await.unwrap();
        let ids: Vec<_> = active.iter().map(|f| f.id).collect();
        assert_eq!(ids, [live.id]);
        assert_eq!(all_featured(&db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (_dir, db) = test_db().await;

        let err = create_featured(&db, poster(""), 1).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let mut input = poster("Heat");
        input.image_path = "posters/heat.pdf".to_owned();
        let err = create_featured(&db, input, 1).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert!(all_featured(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, db) = test_db().await;
        let featured = create_featured(&db, poster("Heat"), 1).await.unwrap();

        delete_featured(&db, featured.id).await.unwrap();
        let err = delete_featured(&db, featured.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
