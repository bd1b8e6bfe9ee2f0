/// Unit of blocking work shipped to the worker. It carries its own reply channel.
pub(crate) type Job = Box<dyn FnOnce() + Send>;

pub(super) enum Command {
    Run { label: &'static str, job: Job },
    Shutdown,
}
