use std::collections::HashMap;

use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

use crate::database::{RecipeFilter, ReviewFilter, Store};
use crate::models::{AuthorSummary, RecipeSummary, Review, ReviewResponse, User};
use crate::services::ownership::ensure_owner;
use crate::utils::{parse_object_id, AppError, AppResult};

fn clean_comment(comment: &str) -> AppResult<String> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(AppError::validation("Comment is required"));
    }
    Ok(comment.to_string())
}

async fn find_review(store: &dyn Store, id: &str) -> AppResult<Review> {
    let id = parse_object_id(id, "Review")?;
    store
        .find_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))
}

/// Attaches the author summary to each review. Authors that no longer
/// exist are left out of the view.
async fn with_authors(store: &dyn Store, reviews: Vec<Review>) -> AppResult<Vec<ReviewResponse>> {
    let mut author_ids: Vec<ObjectId> = reviews.iter().map(|r| r.user_id).collect();
    author_ids.sort();
    author_ids.dedup();

    let authors: HashMap<ObjectId, AuthorSummary> = store
        .find_users(&author_ids)
        .await?
        .iter()
        .map(|user| (user.id, AuthorSummary::from(user)))
        .collect();

    Ok(reviews
        .into_iter()
        .map(|review| {
            let author = authors.get(&review.user_id).cloned();
            ReviewResponse {
                author,
                ..ReviewResponse::from(review)
            }
        })
        .collect())
}

async fn with_recipes(store: &dyn Store, reviews: Vec<Review>) -> AppResult<Vec<ReviewResponse>> {
    let mut recipe_ids: Vec<ObjectId> = reviews.iter().map(|r| r.recipe_id).collect();
    recipe_ids.sort();
    recipe_ids.dedup();

    let recipes: HashMap<ObjectId, RecipeSummary> = store
        .list_recipes(&RecipeFilter::Ids(recipe_ids))
        .await?
        .iter()
        .map(|recipe| (recipe.id, RecipeSummary::from(recipe)))
        .collect();

    Ok(reviews
        .into_iter()
        .map(|review| {
            let recipe = recipes.get(&review.recipe_id).cloned();
            ReviewResponse {
                recipe,
                ..ReviewResponse::from(review)
            }
        })
        .collect())
}

/// Inserts the review, then links it from the recipe.
pub async fn create_review(
    store: &dyn Store,
    author: &User,
    recipe_id: &str,
    comment: &str,
) -> AppResult<ReviewResponse> {
    let comment = clean_comment(comment)?;
    let recipe_id = parse_object_id(recipe_id, "Recipe")?;
    if store.find_recipe(recipe_id).await?.is_none() {
        return Err(AppError::not_found("Recipe not found"));
    }

    let review = Review {
        id: ObjectId::new(),
        user_id: author.id,
        recipe_id,
        comment,
        timestamp: BsonDateTime::now(),
    };
    store.insert_review(&review).await?;
    store.push_review_ref(recipe_id, review.id).await?;

    log::info!("✅ Review {} added to recipe {}", review.id.to_hex(), recipe_id.to_hex());
    Ok(ReviewResponse {
        author: Some(AuthorSummary::from(author)),
        ..ReviewResponse::from(review)
    })
}

pub async fn get_review(store: &dyn Store, id: &str) -> AppResult<ReviewResponse> {
    let review = find_review(store, id).await?;
    let mut views = with_authors(store, vec![review]).await?;
    views.pop().ok_or_else(|| AppError::not_found("Review not found"))
}

pub async fn list_by_recipe(store: &dyn Store, recipe_id: &str) -> AppResult<Vec<ReviewResponse>> {
    let recipe_id = parse_object_id(recipe_id, "Recipe")?;
    let reviews = store.list_reviews(ReviewFilter::Recipe(recipe_id)).await?;
    with_authors(store, reviews).await
}

pub async fn list_by_user(store: &dyn Store, user_id: &str) -> AppResult<Vec<ReviewResponse>> {
    let user_id = parse_object_id(user_id, "User")?;
    let reviews = store.list_reviews(ReviewFilter::Author(user_id)).await?;
    with_recipes(store, reviews).await
}

/// Replaces the comment and refreshes the timestamp.
pub async fn update_review(
    store: &dyn Store,
    user: &User,
    id: &str,
    comment: &str,
) -> AppResult<ReviewResponse> {
    let review = find_review(store, id).await?;
    ensure_owner(&review.user_id, user)?;
    let comment = clean_comment(comment)?;

    let updated = store
        .update_review(review.id, &comment, BsonDateTime::now())
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))?;

    log::info!("✅ Review {} updated", updated.id.to_hex());
    Ok(ReviewResponse {
        author: Some(AuthorSummary::from(user)),
        ..ReviewResponse::from(updated)
    })
}

/// Unlinks the review from its recipe, then deletes it.
pub async fn delete_review(store: &dyn Store, user: &User, id: &str) -> AppResult<()> {
    let review = find_review(store, id).await?;
    ensure_owner(&review.user_id, user)?;

    store.pull_review_ref(review.recipe_id, review.id).await?;
    if !store.delete_review(review.id).await? {
        return Err(AppError::not_found("Review not found"));
    }

    log::info!("🗑️  Review {} deleted", review.id.to_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::Recipe;

    async fn user(store: &MemoryStore, name: &str) -> User {
        let user = User {
            id: ObjectId::new(),
            auth0_id: format!("auth0|{}", name),
            email: format!("{}@example.com", name),
            username: name.to_string(),
            picture: None,
            saved_recipes: vec![],
            created_at: BsonDateTime::now(),
        };
        store.insert_user(&user).await.unwrap();
        user
    }

    async fn recipe(store: &MemoryStore, owner: &User) -> Recipe {
        let recipe = Recipe {
            id: ObjectId::new(),
            recipe_name: "Tomato Soup".into(),
            description: "Warm".into(),
            cooking_time: 30,
            calories: None,
            ingredients: vec!["tomato".into()],
            instructions: "Simmer".into(),
            user_id: owner.id,
            reviews: vec![],
            image: None,
            created_at: BsonDateTime::now(),
        };
        store.insert_recipe(&recipe).await.unwrap();
        recipe
    }

    #[tokio::test]
    async fn create_links_review_from_recipe() {
        let store = MemoryStore::new();
        let owner = user(&store, "ana").await;
        let soup = recipe(&store, &owner).await;

        let review = create_review(&store, &owner, &soup.id.to_hex(), "  Great  ").await.unwrap();
        assert_eq!(review.comment, "Great");
        assert_eq!(review.author.as_ref().map(|a| a.username.as_str()), Some("ana"));

        let stored = store.find_recipe(soup.id).await.unwrap().unwrap();
        assert_eq!(stored.reviews.len(), 1);
        assert_eq!(stored.reviews[0].to_hex(), review.id);
    }

    #[tokio::test]
    async fn create_requires_existing_recipe_and_comment() {
        let store = MemoryStore::new();
        let owner = user(&store, "ana").await;
        let soup = recipe(&store, &owner).await;

        let missing = create_review(&store, &owner, &ObjectId::new().to_hex(), "Hi").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let blank = create_review(&store, &owner, &soup.id.to_hex(), "   ").await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_pulls_back_reference() {
        let store = MemoryStore::new();
        let owner = user(&store, "ana").await;
        let soup = recipe(&store, &owner).await;
        let review = create_review(&store, &owner, &soup.id.to_hex(), "Great").await.unwrap();

        delete_review(&store, &owner, &review.id).await.unwrap();

        let stored = store.find_recipe(soup.id).await.unwrap().unwrap();
        assert!(stored.reviews.is_empty());
        assert!(matches!(get_review(&store, &review.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn only_author_can_edit_or_delete() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;
        let bo = user(&store, "bo").await;
        let soup = recipe(&store, &ana).await;
        let review = create_review(&store, &ana, &soup.id.to_hex(), "Great").await.unwrap();

        let edit = update_review(&store, &bo, &review.id, "Bad").await;
        assert!(matches!(edit, Err(AppError::Forbidden(_))));
        let delete = delete_review(&store, &bo, &review.id).await;
        assert!(matches!(delete, Err(AppError::Forbidden(_))));

        let unchanged = get_review(&store, &review.id).await.unwrap();
        assert_eq!(unchanged.comment, "Great");
        let stored = store.find_recipe(soup.id).await.unwrap().unwrap();
        assert_eq!(stored.reviews.iter().map(|id| id.to_hex()).collect::<Vec<_>>(), vec![review.id.clone()]);

        let updated = update_review(&store, &ana, &review.id, "Even better").await.unwrap();
        assert_eq!(updated.comment, "Even better");
        assert!(updated.timestamp >= review.timestamp);
    }

    #[tokio::test]
    async fn listings_embed_author_or_recipe() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;
        let soup = recipe(&store, &ana).await;
        create_review(&store, &ana, &soup.id.to_hex(), "Great").await.unwrap();

        let by_recipe = list_by_recipe(&store, &soup.id.to_hex()).await.unwrap();
        assert_eq!(by_recipe.len(), 1);
        assert_eq!(by_recipe[0].author.as_ref().map(|a| a.username.as_str()), Some("ana"));

        let by_user = list_by_user(&store, &ana.id.to_hex()).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(
            by_user[0].recipe.as_ref().map(|r| r.recipe_name.as_str()),
            Some("Tomato Soup")
        );
    }
}
