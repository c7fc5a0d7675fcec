//! Static questionnaire registry: segments, questions, answer choices, and the
//! split-aware threshold table used for program recommendations.

use serde::Serialize;

/// Number of nominal segments a respondent walks through.
pub const SEGMENT_COUNT: u8 = 8;

/// Nominal segment whose questions are scored as two independent groups.
pub const SPLIT_SEGMENT: u8 = 5;

/// Number of scored slots once the split segment occupies two of them.
pub const SCORED_SLOT_COUNT: u8 = SEGMENT_COUNT + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerChoice {
    pub label: &'static str,
    pub points: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Question {
    pub prompt: &'static str,
    /// Column heading used by the export collaborator.
    pub export_label: &'static str,
    pub choices: &'static [AnswerChoice],
}

impl Question {
    pub fn max_points(&self) -> i32 {
        self.choices
            .iter()
            .map(|choice| choice.points)
            .max()
            .unwrap_or(0)
    }

    /// Label of the choice worth `points`, if one exists.
    pub fn choice_label(&self, points: i32) -> Option<&'static str> {
        self.choices
            .iter()
            .find(|choice| choice.points == points)
            .map(|choice| choice.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentDefinition {
    pub index: u8,
    pub title: &'static str,
    pub questions: &'static [Question],
}

impl SegmentDefinition {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("segment {0} is outside 1..=8")]
    OutOfRange(u32),
}

/// Looks up a nominal segment (1-based).
pub fn segment(index: u32) -> Result<&'static SegmentDefinition, SegmentError> {
    if index == 0 || index > u32::from(SEGMENT_COUNT) {
        return Err(SegmentError::OutOfRange(index));
    }
    Ok(&SEGMENTS[index as usize - 1])
}

pub fn segments() -> &'static [SegmentDefinition] {
    &SEGMENTS
}

pub fn question_count(index: u32) -> Result<usize, SegmentError> {
    segment(index).map(SegmentDefinition::question_count)
}

/// Which stored answers of a nominal segment feed a scored slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum SlotSpan {
    Whole,
    /// The first `n` answers.
    Leading(usize),
    /// Every answer after the first `n`.
    Trailing(usize),
}

impl SlotSpan {
    pub fn select<'a, T>(&self, answers: &'a [T]) -> &'a [T] {
        match *self {
            SlotSpan::Whole => answers,
            SlotSpan::Leading(n) => &answers[..n.min(answers.len())],
            SlotSpan::Trailing(n) => &answers[n.min(answers.len())..],
        }
    }
}

/// One independently thresholded bucket in split-aware numbering.
///
/// Slots 1-4 are segments 1-4, slots 5 and 6 are the education and
/// employment halves of segment 5, and slots 7-9 are segments 6-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoredSlot {
    pub slot: u8,
    pub segment: u8,
    pub span: SlotSpan,
    pub name: &'static str,
    pub rule: ThresholdRule,
}

impl ScoredSlot {
    pub fn definition(&self) -> &'static SegmentDefinition {
        &SEGMENTS[self.segment as usize - 1]
    }

    pub fn questions(&self) -> &'static [Question] {
        self.span.select(self.definition().questions)
    }

    /// Highest subtotal the slot's questions can produce.
    pub fn max_subtotal(&self) -> i32 {
        self.questions().iter().map(Question::max_points).sum()
    }

    /// Label used when the slot triggers its program, e.g. `LEAP (EMPLOYMENT)`.
    pub fn recommendation(&self) -> String {
        recommendation_label(self.rule.program, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdRule {
    pub threshold: i32,
    pub program: &'static str,
}

/// Shared `PROGRAM (SLOT)` format for recommendations and exports.
pub fn recommendation_label(program: &str, slot_name: &str) -> String {
    format!("{program} ({slot_name})")
}

pub fn scored_slots() -> &'static [ScoredSlot] {
    &SCORED_SLOTS
}

/// Maps a nominal segment to the slots its answers are scored under.
pub fn slots_for_segment(index: u8) -> impl Iterator<Item = &'static ScoredSlot> {
    SCORED_SLOTS.iter().filter(move |slot| slot.segment == index)
}

/// Programs assigned to every respondent regardless of score.
pub const MANDATORY_PROGRAMS: [&str; 7] = [
    "Monthly/periodic report-in-person",
    "Monitoring and Supervision",
    "Therapeutic Community Ladderized Program (TCLP) Mandatory Reinforcing Activities",
    "Restorative Justice Processes",
    "Individual/Group Family/Marital Coaching",
    "Community Work Service/Involvement in community/barangay integration activities",
    "Spiritual/Moral Formation/Reformation activities",
];

const ICARE: &str = "ICARE";
const LEAP: &str = "LEAP";
const HULAGPOS: &str = "Hulagpos";

const fn rule(threshold: i32, program: &'static str) -> ThresholdRule {
    ThresholdRule { threshold, program }
}

static SCORED_SLOTS: [ScoredSlot; SCORED_SLOT_COUNT as usize] = [
    ScoredSlot {
        slot: 1,
        segment: 1,
        span: SlotSpan::Whole,
        name: "CRIMINAL HISTORY",
        rule: rule(5, ICARE),
    },
    ScoredSlot {
        slot: 2,
        segment: 2,
        span: SlotSpan::Whole,
        name: "PRO-CRIMINAL COMPANIONS",
        rule: rule(4, ICARE),
    },
    ScoredSlot {
        slot: 3,
        segment: 3,
        span: SlotSpan::Whole,
        name: "PRO-CRIMINAL ATTITUDES & COGNITIONS",
        rule: rule(4, ICARE),
    },
    ScoredSlot {
        slot: 4,
        segment: 4,
        span: SlotSpan::Whole,
        name: "ANTI-SOCIAL PERSONALITY PATTERNS",
        rule: rule(4, ICARE),
    },
    ScoredSlot {
        slot: 5,
        segment: SPLIT_SEGMENT,
        span: SlotSpan::Leading(3),
        name: "EDUCATION",
        rule: rule(4, LEAP),
    },
    ScoredSlot {
        slot: 6,
        segment: SPLIT_SEGMENT,
        span: SlotSpan::Trailing(3),
        name: "EMPLOYMENT",
        rule: rule(4, LEAP),
    },
    ScoredSlot {
        slot: 7,
        segment: 6,
        span: SlotSpan::Whole,
        name: "FAMILY AND MARITAL STATUS",
        rule: rule(4, LEAP),
    },
    ScoredSlot {
        slot: 8,
        segment: 7,
        span: SlotSpan::Whole,
        name: "SUBSTANCE ABUSE",
        rule: rule(4, ICARE),
    },
    ScoredSlot {
        slot: 9,
        segment: 8,
        span: SlotSpan::Whole,
        name: "MENTAL HEALTH",
        rule: rule(4, HULAGPOS),
    },
];

const fn choice(label: &'static str, points: i32) -> AnswerChoice {
    AnswerChoice { label, points }
}

const fn question(
    prompt: &'static str,
    export_label: &'static str,
    choices: &'static [AnswerChoice],
) -> Question {
    Question {
        prompt,
        export_label,
        choices,
    }
}

const NO_YES_TWO: &[AnswerChoice] = &[choice("NO", 0), choice("YES", 2)];
const NO_YES_ONE: &[AnswerChoice] = &[choice("NO", 0), choice("YES", 1)];
const YES_NO_ONE: &[AnswerChoice] = &[choice("YES", 1), choice("NO", 0)];
const YES_ZERO_NO_ONE: &[AnswerChoice] = &[choice("YES", 0), choice("NO", 1)];
const COMPANION_TYPES: &[AnswerChoice] = &[
    choice("Mostly conventional", 0),
    choice("Sometimes conventional, sometimes delinquent", 1),
    choice("Mostly delinquent", 2),
];
const USAGE_FREQUENCY: &[AnswerChoice] = &[
    choice("No usage", 0),
    choice("At least once a month", 1),
    choice("At least once a week", 2),
    choice("Almost daily", 3),
];

static SEGMENTS: [SegmentDefinition; SEGMENT_COUNT as usize] = [
    SegmentDefinition {
        index: 1,
        title: "CRIMINAL HISTORY",
        questions: &[
            question(
                "Age at First Misconduct",
                "Age at First Misconduct",
                &[
                    choice("26 years old and above", 0),
                    choice("18-25 years old", 1),
                    choice("17 years old and below", 2),
                ],
            ),
            question(
                "Number of Previous Misconduct(s)",
                "Number of Previous Misconduct(s)",
                &[
                    choice("No misconduct", 0),
                    choice("1 misconduct", 1),
                    choice("2 or more misconducts", 2),
                ],
            ),
            question(
                "Extent of Involvement in Organized Crimes",
                "Extent of Involvement in Organized Crimes",
                &[
                    choice("Not a member", 0),
                    choice("Member but inactive", 1),
                    choice("Active membership", 2),
                ],
            ),
            question(
                "Derogatory Record",
                "Derogatory Record",
                &[
                    choice("No record", 0),
                    choice("With 1 record", 1),
                    choice("With 2 or more records", 2),
                ],
            ),
            question(
                "Type of Offender",
                "Type of Offender",
                &[
                    choice("Situational/Circumstantial", 0),
                    choice("Paminsan-minsan", 1),
                    choice("Career offender", 2),
                ],
            ),
            question(
                "History of Violence",
                "History of Violence",
                &[
                    choice("No history of violence", 0),
                    choice("1 incident of violence", 1),
                    choice("2 or more history of violence", 2),
                ],
            ),
        ],
    },
    SegmentDefinition {
        index: 2,
        title: "PRO-CRIMINAL COMPANIONS",
        questions: &[
            question("Type of Companions", "Type of Companions", COMPANION_TYPES),
            question(
                "Type of Activities with Companions",
                "Type of Activities with Companions",
                COMPANION_TYPES,
            ),
            question(
                "Friends' Support",
                "Friends' Support",
                &[
                    choice("Mostly supportive friends", 0),
                    choice("Few supportive friends", 1),
                    choice("No supportive friends", 2),
                ],
            ),
        ],
    },
    SegmentDefinition {
        index: 3,
        title: "PRO-CRIMINAL ATTITUDES & COGNITIONS",
        questions: &[
            question(
                "Is it okay to break the rules/laws as long as I can help my family.",
                "It is okay to break the rules/laws as long as I can help my family.",
                NO_YES_TWO,
            ),
            question(
                "Is it okay to break the rules/laws because I don't know it.",
                "It is okay to break the rules/laws because I don't know it.",
                NO_YES_TWO,
            ),
            question(
                "Is it okay to break the rules/laws when nobody sees me or I don't get caught.",
                "It is okay to break the rules/laws when nobody sees me or I don't get caught.",
                NO_YES_TWO,
            ),
            question(
                "It is okay to commit a crime if you're a victim of social injustice/inequality.",
                "It is okay to commit a crime if you're a victim of social injustice/inequality.",
                NO_YES_TWO,
            ),
            question(
                "Is it okay to commit a crime when you are in a desperate situation/crisis",
                "It is okay to commit a crime when you are in a desperate situation/crisis.",
                NO_YES_TWO,
            ),
        ],
    },
    SegmentDefinition {
        index: 4,
        title: "ANTI-SOCIAL PERSONALITY PATTERNS",
        questions: &[
            question(
                "I find it hard to follow rules.",
                "I find it hard to follow rules.",
                NO_YES_ONE,
            ),
            question(
                "I lie and cheat to get what I want.",
                "I lie and cheat to get what I want.",
                NO_YES_ONE,
            ),
            question(
                "I act without thinking of the consequences of my actions.",
                "I act without thinking of the consequences of my actions.",
                NO_YES_ONE,
            ),
            question(
                "I easily get irritated or angry.",
                "I easily get irritated or angry.",
                NO_YES_ONE,
            ),
            question(
                "I don't care who gets hurt as long as I get what I want.",
                "I don't care who gets hurt as long as I get what I want.",
                NO_YES_ONE,
            ),
            question(
                "I find it hard to follow through with responsibilities/assigned tasks",
                "I find it hard to follow through with responsibilities/assigned tasks.",
                NO_YES_ONE,
            ),
        ],
    },
    SegmentDefinition {
        index: 5,
        title: "EDUCATION AND EMPLOYMENT",
        questions: &[
            question(
                "Educational Attainment",
                "Educational Attainment",
                &[
                    choice("Vocational/College level & above", 0),
                    choice("Grade 7 to 12", 1),
                    choice("Grade 6 and below", 2),
                ],
            ),
            question(
                "Educational Attachment",
                "Educational Attachment",
                &[
                    choice("Interested in school", 0),
                    choice("Lacks interest in school", 1),
                    choice(
                        "Did not get along well with teachers and other students/No interest in school",
                        2,
                    ),
                ],
            ),
            question(
                "Overall Conduct in School",
                "Overall Conduct in School",
                &[
                    choice("Without misdemeanor", 0),
                    choice("With misdemeanor", 2),
                ],
            ),
            question(
                "Employment Status at the Time of Arrest",
                "Employment Status at the Time of Arrest",
                &[
                    choice("Employed", 0),
                    choice("Irregularly employed", 1),
                    choice("Unemployed", 2),
                ],
            ),
            question(
                "Employable Skills",
                "Employable Skills",
                &[
                    choice("With at least employable skill", 0),
                    choice(
                        "No employable skill but with potential and capacity to acquire one",
                        1,
                    ),
                    choice("No employable skill", 2),
                ],
            ),
            question(
                "Employment History",
                "Employment History",
                &[
                    choice(
                        "Treats job seriously; Finds work rewarding; Good relationship with employer and co-workers",
                        0,
                    ),
                    choice(
                        "Inconsistent employment; No employment that lasts 3 months; Minimum attachment to work",
                        1,
                    ),
                    choice(
                        "Does not like/love job; Conflict with the employer; No interest in working; No attachments to work; Frequently fired from work",
                        2,
                    ),
                ],
            ),
        ],
    },
    SegmentDefinition {
        index: 6,
        title: "FAMILY AND MARITAL STATUS",
        questions: &[
            question(
                "Quality of Family/Marital Relationships",
                "Quality of Family/Marital Relationships",
                &[
                    choice("With positive influence", 0),
                    choice("With occasional negative influence", 1),
                    choice("With regular negative influence", 2),
                ],
            ),
            question(
                "Parental Guidance and Supervision",
                "Parental Guidance and Supervision",
                &[
                    choice("Adequate guidance and supervision", 0),
                    choice("Minimal guidance and supervision", 1),
                    choice(
                        "Without guidance and supervision; Overbearing/Over Protective",
                        2,
                    ),
                ],
            ),
            question(
                "Family Acceptability in the Community",
                "Family Acceptability in the Community",
                &[
                    choice("Acceptable", 0),
                    choice("Unacceptable", 1),
                    choice("Highly unacceptable", 2),
                ],
            ),
            question(
                "Spirituality/Religiosity",
                "Spirituality/Religiosity",
                &[
                    choice("Integrated spiritual belief and religious activities", 0),
                    choice(
                        "Disintegrated spiritual belief but with some manifested positive religious belief",
                        1,
                    ),
                    choice(
                        "Disintegrated religious belief and negative religious activities",
                        2,
                    ),
                ],
            ),
        ],
    },
    SegmentDefinition {
        index: 7,
        title: "SUBSTANCE ABUSE",
        questions: &[
            question(
                "History of Drug Abuse",
                "History of Drug Abuse",
                &[
                    choice(
                        "If client abused drugs (other than those required for medical reasons)",
                        1,
                    ),
                    choice("Never", 0),
                ],
            ),
            question(
                "Frequency of Drug Use",
                "Frequency of Drug Use",
                USAGE_FREQUENCY,
            ),
            question(
                "History of Alcohol Abuse",
                "History of Alcohol Abuse",
                &[
                    choice("If client abused alcoholic beverages", 1),
                    choice("Never", 0),
                ],
            ),
            question(
                "Frequency of Alcohol Use",
                "Frequency of Alcohol Use",
                USAGE_FREQUENCY,
            ),
            question(
                "Desire/Urge for Substance Use",
                "Desire/Urge for Substance Use",
                &[
                    choice("Never", 0),
                    choice("Sometimes", 1),
                    choice("Always", 2),
                ],
            ),
            question(
                "Cut Down on Substance Use",
                "Cut Down on Substance Use (Reverse Coded)",
                &[
                    choice("Always able to stop", 0),
                    choice("Unable to stop", 1),
                ],
            ),
            question(
                "Family History of Substance Use",
                "Family History of Substance Use",
                YES_NO_ONE,
            ),
        ],
    },
    SegmentDefinition {
        index: 8,
        title: "MENTAL HEALTH",
        questions: &[
            question(
                "I can perform my daily activities with minimal support from others",
                "I can perform my daily activities with minimal support from others",
                YES_ZERO_NO_ONE,
            ),
            question(
                "I can easily make good decisions on my own",
                "I can easily make good decisions on my own",
                YES_ZERO_NO_ONE,
            ),
            question(
                "I have experienced sadness for 14 days over the last 6 months",
                "I have experienced sadness for 14 days over the last 6 months",
                YES_NO_ONE,
            ),
            question(
                "I have received consultation/treatment/counseling for a psychological/psychiatric problem",
                "I have received consultation/treatment/counseling for a psychological/psychiatric problem",
                YES_NO_ONE,
            ),
            question(
                "I sometimes hear or see things not normally seen or heard by others",
                "I sometimes hear or see things not normally seen or heard by others",
                YES_NO_ONE,
            ),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_eight_segments_in_order() {
        let indices: Vec<u8> = segments().iter().map(|segment| segment.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let counts: Vec<usize> = segments()
            .iter()
            .map(SegmentDefinition::question_count)
            .collect();
        assert_eq!(counts, vec![6, 3, 5, 6, 6, 4, 7, 5]);
    }

    #[test]
    fn rejects_indices_outside_registry() {
        assert_eq!(segment(0), Err(SegmentError::OutOfRange(0)));
        assert_eq!(segment(9), Err(SegmentError::OutOfRange(9)));
        assert_eq!(segment(5).map(|segment| segment.title), Ok("EDUCATION AND EMPLOYMENT"));
    }

    #[test]
    fn split_segment_occupies_two_slots_and_shifts_the_rest() {
        let split: Vec<u8> = slots_for_segment(SPLIT_SEGMENT).map(|slot| slot.slot).collect();
        assert_eq!(split, vec![5, 6]);
        let shifted: Vec<(u8, u8)> = scored_slots()
            .iter()
            .filter(|slot| slot.segment > SPLIT_SEGMENT)
            .map(|slot| (slot.segment, slot.slot))
            .collect();
        assert_eq!(shifted, vec![(6, 7), (7, 8), (8, 9)]);
    }

    #[test]
    fn split_spans_partition_segment_five() {
        let answers = [1, 2, 0, 2, 2, 1];
        let education = SlotSpan::Leading(3).select(&answers);
        let employment = SlotSpan::Trailing(3).select(&answers);
        assert_eq!(education, &[1, 2, 0]);
        assert_eq!(employment, &[2, 2, 1]);

        let short = [2, 1];
        assert_eq!(SlotSpan::Leading(3).select(&short), &[2, 1]);
        assert!(SlotSpan::Trailing(3).select(&short).is_empty());
    }

    #[test]
    fn maximum_subtotals_follow_answer_choices() {
        let maxima: Vec<i32> = scored_slots().iter().map(ScoredSlot::max_subtotal).collect();
        assert_eq!(maxima, vec![12, 6, 10, 6, 6, 6, 8, 12, 5]);
    }

    #[test]
    fn recommendation_label_names_program_and_slot() {
        let employment = &scored_slots()[5];
        assert_eq!(employment.recommendation(), "LEAP (EMPLOYMENT)");
        assert_eq!(
            recommendation_label("LEAP", "EMPLOYMENT"),
            employment.recommendation()
        );
        assert_eq!(
            employment.questions()[0].prompt,
            "Employment Status at the Time of Arrest"
        );
    }
}
