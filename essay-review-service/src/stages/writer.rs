use super::Stage;
use crate::state::{Question, SessionState, StageKind, StageOutput};

const PERSONA: &str = "You are a professional assistant for writing job-application essays. \
Grasp exactly what each question is asking, respect the character limits, and write a \
persuasive answer that matches the applicant's experience to the company's requirements.";

/// Writes the first draft of the answer
pub struct WriterStage;

impl Stage for WriterStage {
    fn kind(&self) -> StageKind {
        StageKind::Writer
    }

    fn persona(&self) -> &'static str {
        PERSONA
    }

    fn build_prompt(&self, state: &SessionState, question: &Question, context: &str) -> String {
        let posting = state.posting();
        let profile = state.profile();

        format!(
            r#"Write an answer to the following application essay question.

[Question]
Question: {prompt}
Length: {min} to {max} characters
Category: {category}

[Company]
Organization: {organization}
Position: {role}
Requirements: {requirements}
Description: {description}
Company values: {values}

[Applicant profile]
Education: {education}
Experience: {experience}
Skills: {skills}
Certificates: {certificates}
Projects: {projects}
Achievements: {achievements}

{context}
Keep the following in mind:
1. Structure the answer around what the question is really asking
2. Lead with concrete experiences and results
3. Pick material that fits the company's requirements and values
4. Respect the length limit exactly (no more than {max} characters)
5. Use paragraphs for readability

Write the answer now."#,
            prompt = question.prompt_text,
            min = question.min_length,
            max = question.max_length,
            category = question.category_or_default(),
            organization = posting.organization,
            role = posting.target_role,
            requirements = posting.requirements,
            description = posting.role_description,
            values = posting.values_or_default(),
            education = profile.education,
            experience = profile.experience,
            skills = profile.skills,
            certificates = profile.certificates,
            projects = profile.projects,
            achievements = profile.achievements,
        )
    }

    fn output(&self, response: &str) -> StageOutput {
        StageOutput::Draft(response.to_string())
    }
}
