mod add_homework;
mod homework_list;
mod homework_status;
mod remove_homework;
mod send_homework;
pub mod util;

pub fn commands() -> [crate::Command; 5] {
    [
        send_homework::send_homework(),
        add_homework::add_homework(),
        homework_status::homework_status(),
        homework_list::homework_list(),
        remove_homework::remove_homework(),
    ]
}
