//! Prompt text and the project context block.

use taskdeck_core::{Project, Task};

/// Default system instruction for both task generation and chat.
pub const SYSTEM_INSTRUCTION: &str = "You are a smart and friendly project management assistant.\n\
Your job is to help the user manage their tasks, suggest ways to break projects down, \
and answer questions about project status.\n\
Keep your answers short and to the point.";

/// Reply stored when the model returns no text.
pub const EMPTY_REPLY_TEXT: &str = "Sorry, I couldn't process that response.";

/// Request for 3–5 task titles, answered as a JSON list of strings.
pub fn task_generation_prompt(name: &str, description: &str) -> String {
    format!(
        "For a project named: \"{name}\"\n\
         Description: \"{description}\"\n\
         \n\
         Please create a list of 3 to 5 concrete tasks to act on immediately.\n\
         Return only the list of tasks as a simple JSON array of strings."
    )
}

/// Context describing the active project and its tasks.
pub fn project_context(project: &Project, tasks: &[Task]) -> String {
    let mut block = format!(
        "Current context:\nActive project: {}\nProject description: {}\n\nCurrent task list:\n",
        project.name, project.description
    );
    for task in tasks {
        block.push_str(&format!("- {} ({})\n", task.title, task.status.label()));
    }
    block
}

/// System framing for a chat turn: instruction followed by the context block.
pub fn chat_system_text(instruction: &str, project: &Project, tasks: &[Task]) -> String {
    format!("{instruction}\n{}", project_context(project, tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taskdeck_core::TaskStatus;

    #[test]
    fn context_lists_every_task_with_its_status() {
        let project = Project::new("Launch", "Plan a product launch");
        let tasks = vec![
            Task::new(project.id.clone(), "Write press release", TaskStatus::Done),
            Task::new(project.id.clone(), "Book venue", TaskStatus::InProgress),
            Task::new(project.id.clone(), "Send invites", TaskStatus::Todo),
        ];

        let block = project_context(&project, &tasks);

        assert!(block.contains("Active project: Launch\n"));
        assert!(block.contains("Project description: Plan a product launch\n"));
        assert!(block.ends_with(
            "- Write press release (done)\n- Book venue (in progress)\n- Send invites (to do)\n"
        ));
    }

    #[test]
    fn generation_prompt_quotes_name_and_description() {
        let prompt = task_generation_prompt("Launch", "Plan it");
        assert!(prompt.contains("\"Launch\""));
        assert!(prompt.contains("\"Plan it\""));
        assert!(prompt.contains("3 to 5"));
    }

    #[test]
    fn chat_framing_puts_instruction_first() {
        let project = Project::new("Launch", "");
        let text = chat_system_text("Be brief.", &project, &[]);
        assert_eq!(text.lines().next(), Some("Be brief."));
    }
}
