/**
 * Choose the questions for a quiz based on the user's past results.
 *
 * The pool is split by category and quiz slots are dealt round-robin over the
 * categories in random order, so every category is represented whenever the
 * quiz is long enough. Within a category, questions are consumed in three
 * tiers:
 *
 * Prioritized: answered badly before, or not seen for a while
 * Neutral:     never attempted, or middling results
 * Skipped:     answered well recently
 *
 * Slots that a small category cannot fill are handed to the leftover
 * questions of the other categories, in the same tier order.
 */
use std::cmp;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::thread_rng;

use super::common::TakeOptions;
use super::quiz::{filter_question, Question, QuestionStats};


// Accuracy below which a question counts as weak.
const WEAK_THRESHOLD: f64 = 0.6;
// Accuracy at or above which a question counts as mastered.
const MASTERED_THRESHOLD: f64 = 0.8;
// How recently a question must have been seen for its mastery to still count.
const RECENCY_WINDOW_DAYS: i64 = 10;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Prioritized,
    Neutral,
    Skipped,
}


/// Choose a set of questions, filtered by the command-line options.
///
/// `stats` is a read-only snapshot of the user's statistics; recording new
/// results is the caller's job, after the quiz has finished.
pub fn choose_questions<'a>(
    questions: &'a [Question],
    stats: &BTreeMap<i64, QuestionStats>,
    options: &TakeOptions,
) -> Vec<&'a Question> {
    let now = Utc::now();

    let mut candidates = Vec::new();
    for question in questions.iter() {
        if filter_question(question, &options.filter_opts) {
            candidates.push(question);
        }
    }

    let target = cmp::min(options.num_to_ask, candidates.len());
    if target == 0 {
        return Vec::new();
    }

    if log::log_enabled!(log::Level::Debug) {
        let mut sizes = [0usize; 3];
        for question in candidates.iter() {
            sizes[get_tier(stats.get(&question.id), now) as usize] += 1;
        }
        debug!(
            "{} candidates: {} prioritized, {} neutral, {} skipped",
            candidates.len(),
            sizes[0],
            sizes[1],
            sizes[2]
        );
    }

    let mut rng = thread_rng();

    // Group the candidates by category and shuffle the category order.
    let mut categories: Vec<(&str, Vec<&Question>)> = Vec::new();
    for question in candidates.iter() {
        match categories.iter_mut().find(|(name, _)| *name == question.category) {
            Some((_, members)) => members.push(*question),
            None => categories.push((question.category.as_str(), vec![*question])),
        }
    }
    categories.shuffle(&mut rng);

    // Deal slots round-robin over the categories. A category may be allotted
    // more slots than it has questions; the difference is made up from the
    // other categories' leftovers below.
    let mut allocations = vec![0; categories.len()];
    let mut dealt = 0;
    while dealt < target {
        for i in 0..categories.len() {
            if dealt == target {
                break;
            }
            allocations[i] += 1;
            dealt += 1;
        }
    }

    // Take each category's allotment in tier order, pooling whatever is left
    // over for backfilling.
    let mut chosen: Vec<&Question> = Vec::new();
    let mut leftovers: Vec<&Question> = Vec::new();
    for (i, (_, members)) in categories.iter().enumerate() {
        let mut ranked = rank(members, stats, now, &mut rng);
        let allotment = cmp::min(allocations[i], ranked.len());
        leftovers.extend(ranked.split_off(allotment));
        chosen.extend(ranked);
    }

    // Backfill the slots that small categories could not fill from the whole
    // remaining pool, irrespective of category.
    if chosen.len() < target {
        let shortfall = target - chosen.len();
        let ranked = rank(&leftovers, stats, now, &mut rng);
        chosen.extend(ranked.into_iter().take(shortfall));
    }

    debug!(
        "chose {} of {} candidates in {} categories ({} requested)",
        chosen.len(),
        candidates.len(),
        categories.len(),
        options.num_to_ask
    );

    if options.in_order {
        chosen.sort_by_key(|q| q.id);
    } else {
        chosen.shuffle(&mut rng);
    }

    chosen
}


/// Order `questions` so that prioritized questions come first and recently
/// mastered ones last, shuffling within each tier.
fn rank<'a>(
    questions: &[&'a Question],
    stats: &BTreeMap<i64, QuestionStats>,
    now: DateTime<Utc>,
    rng: &mut ThreadRng,
) -> Vec<&'a Question> {
    let mut tiers: [Vec<&Question>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for question in questions.iter() {
        tiers[get_tier(stats.get(&question.id), now) as usize].push(*question);
    }

    let mut ranked = Vec::new();
    for tier in tiers.iter_mut() {
        tier.shuffle(rng);
        ranked.append(tier);
    }
    ranked
}


/// Sort a question into a selection tier based on its statistics.
///
/// A question that has never been attempted is neutral: its accuracy defaults
/// to 0.5, so for a brand-new user selection degenerates to a plain
/// category-balanced shuffle.
fn get_tier(stats: Option<&QuestionStats>, now: DateTime<Utc>) -> Tier {
    let stats = match stats {
        Some(stats) if stats.attempts() > 0 => stats,
        _ => return Tier::Neutral,
    };

    let recent = match stats.last_seen {
        Some(last_seen) => now - last_seen <= Duration::days(RECENCY_WINDOW_DAYS),
        None => false,
    };
    let accuracy = stats.accuracy();

    if accuracy < WEAK_THRESHOLD || !recent {
        // Weak or stale questions come around again first, however well they
        // were once known.
        Tier::Prioritized
    } else if accuracy >= MASTERED_THRESHOLD {
        Tier::Skipped
    } else {
        Tier::Neutral
    }
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn chooses_exactly_the_requested_number() {
        let questions = bank(&[("algebra", 10), ("geometry", 10), ("calculus", 10)]);
        let chosen = choose_questions(&questions, &BTreeMap::new(), &options(13));
        assert_eq!(chosen.len(), 13);
        assert_unique(&chosen);
    }

    #[test]
    fn short_pool_yields_short_quiz() {
        let questions = bank(&[("algebra", 2), ("geometry", 1)]);
        let chosen = choose_questions(&questions, &BTreeMap::new(), &options(20));
        assert_eq!(chosen.len(), 3);
        assert_unique(&chosen);
    }

    #[test]
    fn empty_pool_yields_empty_selection() {
        let questions = Vec::new();
        let chosen = choose_questions(&questions, &BTreeMap::new(), &options(20));
        assert_eq!(chosen.len(), 0);
    }

    #[test]
    fn every_category_is_represented() {
        let questions = bank(&[("a", 8), ("b", 8), ("c", 8), ("d", 1)]);
        // Selection is randomized, so check the invariant repeatedly.
        for _ in 0..20 {
            let chosen = choose_questions(&questions, &BTreeMap::new(), &options(4));
            assert_eq!(chosen.len(), 4);
            let cats: BTreeSet<&str> = chosen.iter().map(|q| q.category.as_str()).collect();
            assert_eq!(cats.len(), 4);
        }
    }

    #[test]
    fn single_question_category_is_not_duplicated() {
        let questions = bank(&[("a", 1), ("b", 10)]);
        for _ in 0..20 {
            let chosen = choose_questions(&questions, &BTreeMap::new(), &options(6));
            assert_eq!(chosen.len(), 6);
            assert_unique(&chosen);
            // The lone question takes one slot and the rest backfill from "b".
            assert_eq!(chosen.iter().filter(|q| q.category == "a").count(), 1);
            assert_eq!(chosen.iter().filter(|q| q.category == "b").count(), 5);
        }
    }

    #[test]
    fn weak_questions_come_before_recently_mastered_ones() {
        // Six questions in one category: three answered badly, three answered
        // well and recently. With three slots, only the weak three fit.
        let questions = bank(&[("algebra", 6)]);
        let mut stats = BTreeMap::new();
        for q in questions[..3].iter() {
            stats.insert(q.id, mkstats(0, 4, Some(Utc::now())));
        }
        for q in questions[3..].iter() {
            stats.insert(q.id, mkstats(9, 1, Some(Utc::now())));
        }

        for _ in 0..20 {
            let chosen = choose_questions(&questions, &stats, &options(3));
            let ids: BTreeSet<i64> = chosen.iter().map(|q| q.id).collect();
            let expected: BTreeSet<i64> = questions[..3].iter().map(|q| q.id).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn unseen_questions_come_before_recently_mastered_ones() {
        let questions = bank(&[("algebra", 4)]);
        let mut stats = BTreeMap::new();
        for q in questions[..2].iter() {
            stats.insert(q.id, mkstats(5, 0, Some(Utc::now())));
        }

        for _ in 0..20 {
            let chosen = choose_questions(&questions, &stats, &options(2));
            assert!(chosen.iter().all(|q| stats.get(&q.id).is_none()));
        }
    }

    #[test]
    fn stale_mastery_is_prioritized_again() {
        let questions = bank(&[("algebra", 2)]);
        let mut stats = BTreeMap::new();
        // Mastered long ago.
        stats.insert(questions[0].id, mkstats(10, 0, Some(Utc::now() - Duration::days(30))));
        // Mastered yesterday.
        stats.insert(questions[1].id, mkstats(10, 0, Some(Utc::now() - Duration::days(1))));

        for _ in 0..20 {
            let chosen = choose_questions(&questions, &stats, &options(1));
            assert_eq!(chosen[0].id, questions[0].id);
        }
    }

    #[test]
    fn tier_boundaries() {
        let now = Utc::now();
        let recent = Some(now - Duration::days(1));
        let old = Some(now - Duration::days(11));

        assert_eq!(get_tier(None, now), Tier::Neutral);
        assert_eq!(tier_of(0, 0, recent, now), Tier::Neutral);
        assert_eq!(tier_of(1, 4, recent, now), Tier::Prioritized);
        assert_eq!(tier_of(2, 1, recent, now), Tier::Neutral);
        assert_eq!(tier_of(7, 3, recent, now), Tier::Neutral);
        assert_eq!(tier_of(8, 2, recent, now), Tier::Skipped);
        assert_eq!(tier_of(8, 2, old, now), Tier::Prioritized);
        assert_eq!(tier_of(8, 2, None, now), Tier::Prioritized);
    }

    #[test]
    fn filters_are_applied_before_selection() {
        let questions = bank(&[("algebra", 5), ("geometry", 5)]);
        let mut opts = options(10);
        opts.filter_opts.categories.push(s("algebra"));
        let chosen = choose_questions(&questions, &BTreeMap::new(), &opts);
        assert_eq!(chosen.len(), 5);
        assert!(chosen.iter().all(|q| q.category == "algebra"));
    }

    #[test]
    fn in_order_sorts_by_id() {
        let questions = bank(&[("algebra", 4), ("geometry", 4)]);
        let mut opts = options(8);
        opts.in_order = true;
        let chosen = choose_questions(&questions, &BTreeMap::new(), &opts);
        let ids: Vec<i64> = chosen.iter().map(|q| q.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    fn bank(layout: &[(&str, usize)]) -> Vec<Question> {
        let mut questions = Vec::new();
        let mut id = 1;
        for (category, count) in layout.iter() {
            for _ in 0..*count {
                questions.push(Question {
                    id,
                    text: format!("Question {}?", id),
                    formula: None,
                    alternatives: vec![s("yes"), s("no")],
                    correct: vec![0],
                    category: s(category),
                    image: None,
                });
                id += 1;
            }
        }
        questions
    }

    fn mkstats(correct: u32, wrong: u32, last_seen: Option<DateTime<Utc>>) -> QuestionStats {
        QuestionStats { correct, wrong, last_seen }
    }

    fn tier_of(correct: u32, wrong: u32, last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Tier {
        get_tier(Some(&mkstats(correct, wrong, last_seen)), now)
    }

    fn options(n: usize) -> TakeOptions {
        let mut options = TakeOptions::new();
        options.num_to_ask = n;
        options
    }

    fn assert_unique(chosen: &[&Question]) {
        let ids: BTreeSet<i64> = chosen.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), chosen.len());
    }

    fn s(mystr: &str) -> String {
        String::from(mystr)
    }
}
