use clap::Args;
use probation_risk::error::AppError;
use probation_risk::workflows::assessment::segments::{self, SEGMENT_COUNT};
use probation_risk::workflows::assessment::{
    AssessmentSummary, ScoringEngine, SegmentAnswers, SHORT_SENTENCE,
};

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// Comma-separated scores for one segment, repeated in segment order (e.g. --segment 1,0,2)
    #[arg(long = "segment", value_name = "SCORES")]
    pub(crate) segments: Vec<String>,
    /// Declared sentence-length category
    #[arg(long, default_value = SHORT_SENTENCE)]
    pub(crate) sentence: String,
    /// Print the summary as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let answers = parse_segments(&args.segments)?;
    let summary = ScoringEngine::new().summarize(&answers, &args.sentence);

    if args.json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|err| AppError::Input(err.to_string()))?;
        println!("{rendered}");
    } else {
        render_summary(&summary);
    }
    Ok(())
}

pub(crate) fn parse_segments(raw: &[String]) -> Result<SegmentAnswers, AppError> {
    if raw.len() > usize::from(SEGMENT_COUNT) {
        return Err(AppError::Input(format!(
            "expected at most {SEGMENT_COUNT} --segment values, got {}",
            raw.len()
        )));
    }

    let mut answers = SegmentAnswers::default();
    for (position, list) in raw.iter().enumerate() {
        let segment = position + 1;
        let expected = segments::question_count(segment as u32)?;
        let scores = list
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                value.parse::<i32>().map_err(|_| {
                    AppError::Input(format!("segment {segment}: '{value}' is not an integer"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if scores.len() > expected {
            return Err(AppError::Input(format!(
                "segment {segment} has {expected} questions but {} scores were given",
                scores.len()
            )));
        }
        answers.set(segment as u8, scores);
    }
    Ok(answers)
}

fn render_summary(summary: &AssessmentSummary) {
    let classification = &summary.classification;
    println!("Risk assessment summary");
    println!("- Total score: {}", summary.total_score);
    println!("- Risk level: {}", classification.level);
    println!("- Supervision: {}", classification.supervision);
    println!("- Probation period: {}", classification.probation_period);

    println!("Segment subtotals:");
    for entry in &summary.subtotals {
        let marker = if entry.triggered() { " *" } else { "" };
        println!(
            "  - {}. {}: {}/{} (threshold {}){}",
            entry.slot, entry.name, entry.subtotal, entry.max_subtotal, entry.threshold, marker
        );
    }

    if summary.recommended_programs.is_empty() {
        println!("Recommended programs: none");
    } else {
        println!("Recommended programs:");
        for program in &summary.recommended_programs {
            println!("  - {program}");
        }
    }

    println!("Mandatory programs:");
    for program in &summary.mandatory_programs {
        println!("  - {program}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_segments_in_order() {
        let answers = parse_segments(&args(&["1,1,1,1,1,1", "1, 1, 0", "", "", "1,1,0,2,2,2"]))
            .expect("valid scores");
        assert_eq!(answers.scores(2), &[1, 1, 0]);
        assert!(answers.scores(3).is_empty());

        let summary = ScoringEngine::new().summarize(&answers, SHORT_SENTENCE);
        assert_eq!(summary.total_score, 16);
    }

    #[test]
    fn rejects_non_numeric_scores() {
        let err = parse_segments(&args(&["1,x"])).expect_err("invalid score");
        assert!(err.to_string().contains("'x' is not an integer"));
    }

    #[test]
    fn rejects_more_scores_than_questions() {
        let err = parse_segments(&args(&["1,1,1,1,1,1", "1,1,1,1"])).expect_err("too many");
        assert!(matches!(err, AppError::Input(_)));
    }

    #[test]
    fn rejects_a_ninth_segment() {
        let values = vec!["0".to_string(); 9];
        assert!(parse_segments(&values).is_err());
    }

    #[test]
    fn run_score_accepts_empty_input() {
        run_score(ScoreArgs {
            segments: Vec::new(),
            sentence: SHORT_SENTENCE.to_string(),
            json: true,
        })
        .expect("empty assessment scores to zero");
    }
}
