/// Aggregation engine
///
/// Grouped metrics over the reviews embedded in user records and over the
/// comment collection. Every pipeline is a fold over a flattened tuple
/// sequence; the store is only asked for the source documents. Results are
/// keyed maps with no ranking applied.
use super::models::{decode, CommentRef, Review, Reviewer};
use crate::{
    error::CatalogResult,
    metrics,
    store::{Collection, Filter, FindOptions, RecordStore},
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// A review flattened out of its owning user
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTuple {
    pub user_id: i64,
    pub job: Option<String>,
    pub book_id: i64,
    pub score: f64,
}

/// Unwind every user's embedded reviews
pub fn unwind_reviews(reviewers: &[Reviewer]) -> impl Iterator<Item = ReviewTuple> + '_ {
    reviewers.iter().flat_map(|reviewer| {
        reviewer.reviews().iter().map(move |review: &Review| ReviewTuple {
            user_id: reviewer.id,
            job: reviewer.job.clone(),
            book_id: review.book_id,
            score: review.points(),
        })
    })
}

/// Count occurrences per key
fn count_by<K: Ord, I: IntoIterator>(items: I, key: impl Fn(&I::Item) -> K) -> BTreeMap<K, u64> {
    items.into_iter().fold(BTreeMap::new(), |mut acc, item| {
        *acc.entry(key(&item)).or_insert(0) += 1;
        acc
    })
}

/// Five-star review count per book. Books without one are absent.
pub fn count_five_star_by_book<I>(reviews: I) -> BTreeMap<i64, u64>
where
    I: IntoIterator<Item = ReviewTuple>,
{
    count_by(
        reviews.into_iter().filter(|review| review.score == 5.0),
        |review| review.book_id,
    )
}

/// Mean score per book, optionally restricted to one book.
///
/// A book with no reviews has no entry; callers must treat absence as
/// "no data", never as zero.
pub fn average_score_by_book<I>(reviews: I, only_book: Option<i64>) -> BTreeMap<i64, f64>
where
    I: IntoIterator<Item = ReviewTuple>,
{
    let sums = reviews
        .into_iter()
        .filter(|review| only_book.map_or(true, |id| review.book_id == id))
        .fold(BTreeMap::new(), |mut acc: BTreeMap<i64, (f64, u64)>, review| {
            let entry = acc.entry(review.book_id).or_insert((0.0, 0));
            entry.0 += review.score;
            entry.1 += 1;
            acc
        });

    sums.into_iter()
        .map(|(book_id, (sum, count))| (book_id, sum / count as f64))
        .collect()
}

/// Review count per book
pub fn count_reviews_by_book<I>(reviews: I) -> BTreeMap<i64, u64>
where
    I: IntoIterator<Item = ReviewTuple>,
{
    count_by(reviews, |review| review.book_id)
}

/// Review count per reviewer job. Users without a job group under `None`.
pub fn count_reviews_by_job<I>(reviews: I) -> BTreeMap<Option<String>, u64>
where
    I: IntoIterator<Item = ReviewTuple>,
{
    count_by(reviews, |review| review.job.clone())
}

/// Comment count per book
pub fn count_comments_by_book(comments: &[CommentRef]) -> BTreeMap<i64, u64> {
    count_by(comments.iter(), |comment| comment.book_id)
}

/// Runs the aggregation pipelines against a record store
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn RecordStore>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn reviewers(&self) -> CatalogResult<Vec<Reviewer>> {
        let users = self
            .store
            .find(Collection::Users, &Filter::All, FindOptions::default())
            .await?;
        users.iter().map(decode::<Reviewer>).collect()
    }

    pub async fn five_star_by_book(&self) -> CatalogResult<BTreeMap<i64, u64>> {
        metrics::record_aggregation("five_star_by_book");
        let reviewers = self.reviewers().await?;
        let counts = count_five_star_by_book(unwind_reviews(&reviewers));
        debug!(books = counts.len(), "five_star_by_book");
        Ok(counts)
    }

    pub async fn average_score_by_book(
        &self,
        only_book: Option<i64>,
    ) -> CatalogResult<BTreeMap<i64, f64>> {
        metrics::record_aggregation("average_score_by_book");
        let reviewers = self.reviewers().await?;
        Ok(average_score_by_book(unwind_reviews(&reviewers), only_book))
    }

    /// Average score of one book, `None` when nobody reviewed it
    pub async fn average_score_of(&self, book_id: i64) -> CatalogResult<Option<f64>> {
        Ok(self
            .average_score_by_book(Some(book_id))
            .await?
            .get(&book_id)
            .copied())
    }

    pub async fn reviews_by_book(&self) -> CatalogResult<BTreeMap<i64, u64>> {
        metrics::record_aggregation("reviews_by_book");
        let reviewers = self.reviewers().await?;
        Ok(count_reviews_by_book(unwind_reviews(&reviewers)))
    }

    pub async fn reviews_by_job(&self) -> CatalogResult<BTreeMap<Option<String>, u64>> {
        metrics::record_aggregation("reviews_by_job");
        let reviewers = self.reviewers().await?;
        Ok(count_reviews_by_job(unwind_reviews(&reviewers)))
    }

    pub async fn comments_by_book(&self) -> CatalogResult<BTreeMap<i64, u64>> {
        metrics::record_aggregation("comments_by_book");
        let comments = self
            .store
            .find(Collection::Comments, &Filter::All, FindOptions::default())
            .await?;
        let comments = comments
            .iter()
            .map(decode::<CommentRef>)
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(count_comments_by_book(&comments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use serde_json::json;

    fn reviewer(id: i64, job: Option<&str>, reviews: &[(i64, i64)]) -> Reviewer {
        Reviewer {
            id,
            job: job.map(str::to_string),
            reviews: reviews
                .iter()
                .map(|&(book_id, score)| Review::new(book_id, score))
                .collect(),
        }
    }

    fn sample() -> Vec<Reviewer> {
        vec![
            reviewer(1, Some("Nurse"), &[(10, 5), (11, 3), (12, 5)]),
            reviewer(2, Some("Librarian"), &[(10, 5), (11, 4)]),
            reviewer(3, None, &[(10, 2)]),
            reviewer(4, Some("Nurse"), &[]),
        ]
    }

    #[test]
    fn test_five_star_counts_exact_and_absent_for_zero() {
        let reviewers = sample();
        let counts = count_five_star_by_book(unwind_reviews(&reviewers));

        assert_eq!(counts.get(&10), Some(&2));
        assert_eq!(counts.get(&12), Some(&1));
        // Book 11 has reviews but none with five stars
        assert_eq!(counts.get(&11), None);
    }

    #[test]
    fn test_average_score_is_arithmetic_mean() {
        let reviewers = sample();
        let averages = average_score_by_book(unwind_reviews(&reviewers), None);

        assert_eq!(averages[&10], 4.0);
        assert_eq!(averages[&11], 3.5);
        assert_eq!(averages[&12], 5.0);
    }

    #[test]
    fn test_average_score_single_book_without_reviews_is_absent() {
        let reviewers = sample();
        let averages = average_score_by_book(unwind_reviews(&reviewers), Some(99));
        assert!(averages.is_empty());

        let averages = average_score_by_book(unwind_reviews(&reviewers), Some(11));
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[&11], 3.5);
    }

    #[test]
    fn test_review_counts_by_book_and_job() {
        let reviewers = sample();

        let by_book = count_reviews_by_book(unwind_reviews(&reviewers));
        assert_eq!(by_book[&10], 3);
        assert_eq!(by_book[&11], 2);
        assert_eq!(by_book[&12], 1);

        let by_job = count_reviews_by_job(unwind_reviews(&reviewers));
        assert_eq!(by_job[&Some("Nurse".to_string())], 3);
        assert_eq!(by_job[&Some("Librarian".to_string())], 2);
        assert_eq!(by_job[&None], 1);
    }

    #[test]
    fn test_comment_counts() {
        let comments = vec![
            CommentRef { id: 1, book_id: 7 },
            CommentRef { id: 2, book_id: 7 },
            CommentRef { id: 3, book_id: 8 },
        ];
        let counts = count_comments_by_book(&comments);
        assert_eq!(counts[&7], 2);
        assert_eq!(counts[&8], 1);
    }

    #[tokio::test]
    async fn test_engine_reads_from_store() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .seed(
                Collection::Users,
                vec![
                    json!({"_id": 1, "job": "Pilot", "reviews": [{"book_id": 1, "score": 5}, {"book_id": 2, "score": 1}]}),
                    json!({"_id": 2, "job": "Pilot", "reviews": [{"book_id": 1, "score": 4}]}),
                ]
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            )
            .await;

        let engine = AggregationEngine::new(store);
        assert_eq!(engine.five_star_by_book().await.unwrap()[&1], 1);
        assert_eq!(engine.average_score_of(1).await.unwrap(), Some(4.5));
        assert_eq!(engine.average_score_of(3).await.unwrap(), None);
        assert_eq!(
            engine.reviews_by_job().await.unwrap()[&Some("Pilot".to_string())],
            3
        );
    }

    #[tokio::test]
    async fn test_engine_tolerates_irregular_reviews() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .seed(
                Collection::Users,
                vec![
                    json!({"_id": 1, "reviews": [{"book_id": 1, "score": 5}, {"book_id": 2, "score": i64::MAX}]}),
                    json!({"_id": 2, "reviews": [{"book_id": 1, "score": 4.5}, {"book_id": 1}, {"book_id": 2, "score": 1}]}),
                ]
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            )
            .await;

        let engine = AggregationEngine::new(store);
        assert_eq!(engine.five_star_by_book().await.unwrap().get(&1), Some(&1));
        assert_eq!(engine.average_score_of(1).await.unwrap(), Some(4.75));
        assert_eq!(engine.reviews_by_book().await.unwrap()[&1], 2);

        let huge = engine.average_score_of(2).await.unwrap().unwrap();
        assert!(huge.is_finite());
        assert!(huge > 4.0e18);
    }
}
