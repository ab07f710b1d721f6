use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

pub type JobOutcome<T> = Result<T, String>;

pub fn run_pool<T, F>(ids: &[usize], workers: usize, job: F) -> BTreeMap<usize, JobOutcome<T>>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if ids.is_empty() {
        return BTreeMap::new();
    }

    let workers = workers.clamp(1, ids.len());
    let (job_sender, job_receiver) = crossbeam_channel::bounded::<usize>(workers);
    let (result_sender, result_receiver) = crossbeam_channel::unbounded::<(usize, JobOutcome<T>)>();
    let job = &job;

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let job_receiver = job_receiver.clone();
            let result_sender = result_sender.clone();
            scope.spawn(move || {
                for id in job_receiver.iter() {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| job(id))).map_err(|payload| {
                            let message = panic_message(payload.as_ref());
                            tracing::error!(worker, id, panic = %message, "batch job panicked");
                            message
                        });
                    if result_sender.send((id, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_receiver);
        drop(result_sender);

        for id in ids {
            if job_sender.send(*id).is_err() {
                break;
            }
        }
        drop(job_sender);

        result_receiver.iter().collect()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked with a non-string payload".to_string()
    }
}
