pub mod homework;

pub fn commands() -> Vec<crate::Command> {
    homework::commands().into_iter().collect()
}
