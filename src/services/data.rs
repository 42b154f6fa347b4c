//! Generic asynchronous data service.
//!
//! [`DataService`] is the base every concrete persistence service is built
//! on. It owns a private serial worker bound to one [`PersistenceContext`]
//! and exposes generic fetch/insert/update/delete operations parameterized
//! by caller-supplied value↔record transforms.
//!
//! # Ordering
//!
//! Every operation — fetch or mutation — runs on the instance's single
//! worker in submission order. Two operations issued back-to-back are never
//! interleaved at the storage layer; the second observes the first's
//! effects. Batches are therefore effectively atomic within one instance:
//! no other operation on the same instance can observe a half-written
//! batch, and the underlying save commits all-or-nothing.
//!
//! # Completion
//!
//! Operations return immediately. Exactly one of the success/failure
//! callbacks fires per operation, posted to the application's
//! [`MainQueue`](crate::MainQueue). Failures always carry the uniform
//! [`DataError`] shape; nothing panics across this boundary.

use crate::dispatch::MainQueueHandle;
use crate::models::EntityBridge;
use crate::storage::metrics::record_operation_metrics;
use crate::storage::{FetchRequest, PersistenceContext, Record};
use crate::{DataError, Result};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Instant;

/// A unit of storage work executed on the serial worker.
type Job = Box<dyn FnOnce(&mut PersistenceContext) + Send + 'static>;

/// Owns the worker thread and the sending side of its job channel.
///
/// Dropping the last handle closes the channel and joins the worker, so a
/// service never outlives its context.
struct ServiceCore {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for ServiceCore {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Generic, typed, asynchronous CRUD over one persistence context.
///
/// Cheap to clone; clones share the same worker and therefore the same
/// ordering domain. Concrete services (for example
/// [`UserInfoService`](crate::services::UserInfoService)) wrap a
/// `DataService` and supply entity names and transforms.
#[derive(Clone)]
pub struct DataService {
    core: Arc<ServiceCore>,
    main: MainQueueHandle,
}

impl DataService {
    /// Creates a service owning `context` and posting completions to `main`.
    ///
    /// The context moves onto the private worker thread; this is the only
    /// place it is ever touched afterward.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new(context: PersistenceContext, main: MainQueueHandle) -> Result<Self> {
        let (jobs, queue) = std::sync::mpsc::channel::<Job>();
        let name = format!("{}-data", context.model().name());

        let worker = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                let mut context = context;
                while let Ok(job) = queue.recv() {
                    job(&mut context);
                }
            })
            .map_err(|e| {
                DataError::operation(format!("cannot spawn data service worker: {e}"))
            })?;

        Ok(Self {
            core: Arc::new(ServiceCore {
                jobs: Some(jobs),
                worker: Some(worker),
            }),
            main,
        })
    }

    /// Enqueues a job on the serial worker.
    fn submit(&self, job: Job) {
        let Some(jobs) = self.core.jobs.as_ref() else {
            tracing::error!("data service worker is gone, dropping operation");
            return;
        };
        if jobs.send(job).is_err() {
            tracing::error!("data service worker is gone, dropping operation");
        }
    }

    // MARK: Fetch

    /// Executes a fetch request, transforming every record into a value
    /// object.
    ///
    /// The transform must succeed for every record; use
    /// [`execute_fetch_optional`](Self::execute_fetch_optional) when records
    /// may be skipped. Returned objects carry their storage handle and a
    /// fresh retrieval timestamp, in query order.
    pub fn execute_fetch<E, T, S, F>(
        &self,
        request: FetchRequest,
        transform: T,
        success: S,
        failure: F,
    ) where
        E: EntityBridge + Send + 'static,
        T: Fn(&Record) -> E + Send + 'static,
        S: FnOnce(Vec<E>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let main = self.main.clone();
        self.submit(Box::new(move |context| {
            let start = Instant::now();
            match fetch_objects(context, &request, |record| Some(transform(record))) {
                Ok(objects) => {
                    record_operation_metrics("fetch", start, "success");
                    main.post(move || success(objects));
                },
                Err(error) => {
                    record_operation_metrics("fetch", start, "error");
                    main.post(move || failure(error));
                },
            }
        }));
    }

    /// Executes a fetch request with a transform that may skip records.
    ///
    /// Records the transform maps to `None` are silently dropped; order is
    /// otherwise preserved.
    pub fn execute_fetch_optional<E, T, S, F>(
        &self,
        request: FetchRequest,
        transform: T,
        success: S,
        failure: F,
    ) where
        E: EntityBridge + Send + 'static,
        T: Fn(&Record) -> Option<E> + Send + 'static,
        S: FnOnce(Vec<E>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let main = self.main.clone();
        self.submit(Box::new(move |context| {
            let start = Instant::now();
            match fetch_objects(context, &request, &transform) {
                Ok(objects) => {
                    record_operation_metrics("fetch", start, "success");
                    main.post(move || success(objects));
                },
                Err(error) => {
                    record_operation_metrics("fetch", start, "error");
                    main.post(move || failure(error));
                },
            }
        }));
    }

    // MARK: Insertion

    /// Inserts a batch of value objects.
    ///
    /// For each object, in input order, a new record is created, populated
    /// via the closure, and staged; one save commits the whole batch. On
    /// success every input object carries its newly assigned storage handle
    /// and the batch is returned in input order. On any failure — populate
    /// error or save error — nothing is committed and no handle is
    /// assigned.
    pub fn insert_objects<E, P, S, F>(
        &self,
        entity: impl Into<String>,
        objects: Vec<E>,
        populate: P,
        success: S,
        failure: F,
    ) where
        E: EntityBridge + Send + 'static,
        P: Fn(&E, &mut Record) -> Result<()> + Send + 'static,
        S: FnOnce(Vec<E>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let entity = entity.into();
        let main = self.main.clone();
        self.submit(Box::new(move |context| {
            let start = Instant::now();
            let staged = stage_inserts(context, &entity, &objects, &populate);
            let result = staged.and_then(|()| context.save());
            match result {
                Ok(handles) => {
                    let mut objects = objects;
                    for (object, handle) in objects.iter_mut().zip(handles) {
                        object.set_storage_handle(handle);
                    }
                    record_operation_metrics("insert", start, "success");
                    main.post(move || success(objects));
                },
                Err(error) => {
                    context.discard_staged();
                    record_operation_metrics("insert", start, "error");
                    main.post(move || failure(error));
                },
            }
        }));
    }

    // MARK: Update

    /// Updates a batch of previously saved value objects.
    ///
    /// Every object must carry a storage handle; the first one without a
    /// handle aborts the whole batch before any save is attempted, and the
    /// staged changes of earlier objects are discarded. For each valid
    /// object the stored record is located by handle, mutated via the
    /// closure, and staged; one save commits the batch.
    pub fn update_objects<E, M, S, F>(&self, objects: Vec<E>, mutate: M, success: S, failure: F)
    where
        E: EntityBridge + fmt::Debug + Send + 'static,
        M: Fn(&E, &mut Record) -> Result<()> + Send + 'static,
        S: FnOnce() + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let main = self.main.clone();
        self.submit(Box::new(move |context| {
            let start = Instant::now();
            let staged = stage_updates(context, &objects, &mutate);
            let result = staged.and_then(|()| context.save().map(|_| ()));
            match result {
                Ok(()) => {
                    record_operation_metrics("update", start, "success");
                    main.post(success);
                },
                Err(error) => {
                    context.discard_staged();
                    record_operation_metrics("update", start, "error");
                    main.post(move || failure(error));
                },
            }
        }));
    }

    // MARK: Deletion

    /// Removes every instance of an entity kind.
    ///
    /// Record identities are fetched without materializing values, staged
    /// for deletion, and committed in one save. An empty entity set
    /// succeeds with zero deletions.
    pub fn remove_all_instances<S, F>(&self, entity: impl Into<String>, success: S, failure: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let entity = entity.into();
        let main = self.main.clone();
        self.submit(Box::new(move |context| {
            let start = Instant::now();
            let result = context.fetch_handles(&entity).and_then(|handles| {
                for handle in &handles {
                    context.stage_delete(handle);
                }
                context.save().map(|_| ())
            });
            match result {
                Ok(()) => {
                    record_operation_metrics("remove_all", start, "success");
                    main.post(success);
                },
                Err(error) => {
                    context.discard_staged();
                    record_operation_metrics("remove_all", start, "error");
                    main.post(move || failure(error));
                },
            }
        }));
    }

    /// Removes a batch of previously saved value objects.
    ///
    /// Every object must carry a storage handle; the first one without a
    /// handle aborts the whole batch before any save is attempted.
    pub fn remove_instances<E, S, F>(&self, objects: Vec<E>, success: S, failure: F)
    where
        E: EntityBridge + fmt::Debug + Send + 'static,
        S: FnOnce() + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let main = self.main.clone();
        self.submit(Box::new(move |context| {
            let start = Instant::now();
            let staged = stage_deletes(context, &objects);
            let result = staged.and_then(|()| context.save().map(|_| ()));
            match result {
                Ok(()) => {
                    record_operation_metrics("remove", start, "success");
                    main.post(success);
                },
                Err(error) => {
                    context.discard_staged();
                    record_operation_metrics("remove", start, "error");
                    main.post(move || failure(error));
                },
            }
        }));
    }
}

/// Fetches and transforms records, stamping bridge state on every object.
fn fetch_objects<E, T>(
    context: &PersistenceContext,
    request: &FetchRequest,
    transform: T,
) -> Result<Vec<E>>
where
    E: EntityBridge,
    T: Fn(&Record) -> Option<E>,
{
    let records = context.fetch(request)?;
    let retrieved_at = Utc::now();

    let mut objects = Vec::with_capacity(records.len());
    for record in &records {
        let Some(mut object) = transform(record) else {
            continue;
        };
        if let Some(handle) = record.handle() {
            object.set_storage_handle(handle.clone());
        }
        object.set_retrieved_at(retrieved_at);
        objects.push(object);
    }
    Ok(objects)
}

/// Creates, populates, and stages one record per object, in input order.
fn stage_inserts<E, P>(
    context: &mut PersistenceContext,
    entity: &str,
    objects: &[E],
    populate: P,
) -> Result<()>
where
    E: EntityBridge,
    P: Fn(&E, &mut Record) -> Result<()>,
{
    for object in objects {
        let mut record = Record::new(entity);
        populate(object, &mut record)?;
        context.stage_insert(record)?;
    }
    Ok(())
}

/// Locates, mutates, and stages the stored record of each object.
///
/// Fails fast on the first object without a storage handle: later objects
/// are neither fetched nor mutated.
fn stage_updates<E, M>(context: &mut PersistenceContext, objects: &[E], mutate: M) -> Result<()>
where
    E: EntityBridge + fmt::Debug,
    M: Fn(&E, &mut Record) -> Result<()>,
{
    for object in objects {
        let Some(handle) = object.storage_handle() else {
            return Err(DataError::missing_handle("save", &format!("{object:?}")));
        };
        let handle = handle.clone();
        let mut record = context.record(&handle)?;
        mutate(object, &mut record)?;
        context.stage_update(&handle, record)?;
    }
    Ok(())
}

/// Stages a delete for each object, failing fast on a missing handle.
fn stage_deletes<E>(context: &mut PersistenceContext, objects: &[E]) -> Result<()>
where
    E: EntityBridge + fmt::Debug,
{
    for object in objects {
        let Some(handle) = object.storage_handle() else {
            return Err(DataError::missing_handle("delete", &format!("{object:?}")));
        };
        let handle = handle.clone();
        context.stage_delete(&handle);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MainQueue;
    use crate::storage::schema::{AttributeKind, EntityDescriptor, Model};

    fn test_model() -> Model {
        Model::new("dodo").with_entity(
            EntityDescriptor::new("user_info").with_attribute("username", AttributeKind::Text),
        )
    }

    #[test]
    fn test_service_shuts_down_cleanly() {
        let main = MainQueue::new();
        let context = PersistenceContext::in_memory(test_model()).unwrap();
        let service = DataService::new(context, main.handle()).unwrap();
        drop(service);
    }

    #[test]
    fn test_clones_share_one_worker() {
        let main = MainQueue::new();
        let context = PersistenceContext::in_memory(test_model()).unwrap();
        let service = DataService::new(context, main.handle()).unwrap();
        let clone = service.clone();
        assert!(Arc::ptr_eq(&service.core, &clone.core));
    }
}
