//! Builders shared by the engine integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use uuid::Uuid;
use winner_core::{
    Alias, AmazonListing, AmazonReview, Entity, EntityType, QueryType, Source, TikTokMetric,
};
use winner_engine::MemoryStore;

/// A Monday.
pub fn week() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn day(offset: i64) -> NaiveDate {
    week() + Duration::days(offset)
}

pub fn entity(name: &str) -> Entity {
    Entity {
        id: Uuid::new_v4(),
        entity_type: EntityType::Concept,
        canonical_name: name.to_string(),
        category_primary: None,
    }
}

pub fn alias(entity_id: Uuid, source: Source, text: &str) -> Alias {
    Alias::new(entity_id, source, text, 1.0).unwrap()
}

/// Register an entity with one Amazon brand alias and one TikTok hashtag.
pub fn seed_entity(store: &MemoryStore, name: &str, brand: &str, hashtag: &str) -> Uuid {
    let e = entity(name);
    let id = e.id;
    let aliases = [
        alias(id, Source::Amazon, brand),
        alias(id, Source::Tiktok, hashtag),
    ];
    store.add_entity(e, &aliases).unwrap();
    id
}

pub fn listing(dt: NaiveDate, asin: &str, brand: &str, bsr: i64) -> AmazonListing {
    AmazonListing {
        dt,
        asin: asin.to_string(),
        title: Some(format!("{brand} product {asin}")),
        brand: Some(brand.to_string()),
        category: Some("Home & Kitchen".to_string()),
        price_usd: Some(20.0),
        bsr: Some(bsr),
        rating: Some(4.5),
        review_count: Some(100),
        image_count: Some(6),
        video_flag: false,
        first_seen_date: Some(dt - Duration::days(120)),
        last_seen_date: Some(dt),
    }
}

pub fn review(dt: NaiveDate, asin: &str, text: &str, rating: f64) -> AmazonReview {
    AmazonReview {
        dt,
        asin: asin.to_string(),
        review_text: Some(text.to_string()),
        rating: Some(rating),
    }
}

pub fn hashtag(dt: NaiveDate, query: &str, views: i64, creators: i64) -> TikTokMetric {
    TikTokMetric {
        dt,
        query: query.to_string(),
        query_type: QueryType::Hashtag,
        views: Some(views),
        videos: Some(views / 1_000),
        likes: None,
        comments: None,
        shares: None,
        creator_count: Some(creators),
    }
}
