use quiz_core::model::{Question, QuestionId, TopicId, UserId};
use storage::repository::{ProgressRepository, QuestionSource, RetestKeyRepository};
use storage::sqlite::SqliteRepository;

fn build_question(id: &str, topic: &str, correct_index: usize) -> Question {
    Question::new(
        QuestionId::new(id),
        TopicId::new(topic),
        format!("prompt {id}"),
        vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_index,
    )
    .unwrap()
    .with_explanation(format!("explanation {id}"))
    .with_tags(vec!["exam".into()])
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_round_trips_questions_by_topic() {
    let repo = connect("memdb_questions").await;

    repo.upsert_question(&build_question("q1", "anatomy", 2))
        .await
        .unwrap();
    repo.upsert_question(&build_question("q2", "physiology", 0))
        .await
        .unwrap();

    let user = UserId::new("u1");
    let pool = repo
        .questions_by_topics(&user, &[TopicId::new("anatomy")])
        .await
        .unwrap();

    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].id(), &QuestionId::new("q1"));
    assert_eq!(pool[0].correct_index(), 2);
    assert_eq!(pool[0].explanation(), Some("explanation q1"));
    assert_eq!(pool[0].tags(), ["exam".to_string()]);
}

#[tokio::test]
async fn sqlite_fetches_by_ids_and_omits_missing() {
    let repo = connect("memdb_by_ids").await;

    repo.upsert_question(&build_question("q1", "anatomy", 0))
        .await
        .unwrap();
    repo.upsert_question(&build_question("q2", "anatomy", 1))
        .await
        .unwrap();

    let found = repo
        .questions_by_ids(&[
            QuestionId::new("q2"),
            QuestionId::new("q1"),
            QuestionId::new("missing"),
        ])
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn sqlite_retest_keys_overwrite_previous_list() {
    let repo = connect("memdb_retest").await;

    assert!(repo.load_keys().await.unwrap().is_empty());

    repo.save_keys(&[QuestionId::new("q3"), QuestionId::new("q1")])
        .await
        .unwrap();
    let loaded = repo.load_keys().await.unwrap();
    assert_eq!(loaded, [QuestionId::new("q3"), QuestionId::new("q1")]);

    repo.save_keys(&[QuestionId::new("q2")]).await.unwrap();
    assert_eq!(repo.load_keys().await.unwrap(), [QuestionId::new("q2")]);
}

#[tokio::test]
async fn sqlite_solved_record_is_idempotent_per_question() {
    let repo = connect("memdb_solved").await;
    let user = UserId::new("u1");
    let question = QuestionId::new("q1");

    repo.record_solved(&user, &question, false).await.unwrap();
    // a retried record overwrites instead of duplicating
    repo.record_solved(&user, &question, false).await.unwrap();

    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM solved_questions")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(row.0, 1);
}

#[tokio::test]
async fn sqlite_topic_attempts_increment_atomically() {
    let repo = connect("memdb_attempts").await;
    let user = UserId::new("u1");
    let topic = TopicId::new("anatomy");

    repo.increment_topic_attempt(&user, &topic).await.unwrap();
    repo.increment_topic_attempt(&user, &topic).await.unwrap();
    repo.increment_topic_attempt(&user, &topic).await.unwrap();

    let row: (i64,) = sqlx::query_as(
        "SELECT attempted FROM topic_attempts WHERE user_id = ?1 AND topic_id = ?2",
    )
    .bind(user.as_str())
    .bind(topic.as_str())
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(row.0, 3);
}
