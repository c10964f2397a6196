mod shell;

pub(crate) use shell::ShellController;
