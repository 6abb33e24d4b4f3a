//! In-memory record store with per-subject serialization
//!
//! Each record lives behind its own `Arc<Mutex<_>>` inside a registry
//! map. Transitions take the subject's lock for their whole
//! check-mutate-audit sequence, so two transitions on the same record
//! serialize while unrelated records proceed in parallel. The registry
//! maps themselves sit behind `RwLock`s that are held only long enough
//! to clone out the `Arc`.
//!
//! When a transition touches a request and its work order it locks the
//! request first, then the work order. All callers follow that order.

use orderflow_types::{
    AuditEntry, AuditTrail, EngineError, EngineResult, LeaveRequest, LeaveRequestId, Proposal,
    ProposalId, Request, RequestId, WorkOrder, WorkOrderId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Acquire a subject lock, mapping poisoning to an internal error
pub(crate) fn lock<T>(subject: &Mutex<T>) -> EngineResult<MutexGuard<'_, T>> {
    subject
        .lock()
        .map_err(|_| EngineError::Internal("subject lock poisoned".into()))
}

/// Registries for every record type, plus the shared audit trail
#[derive(Debug, Default)]
pub struct EngineStore {
    proposals: RwLock<HashMap<ProposalId, Arc<Mutex<Proposal>>>>,
    work_orders: RwLock<HashMap<WorkOrderId, Arc<Mutex<WorkOrder>>>>,
    requests: RwLock<HashMap<RequestId, Arc<Mutex<Request>>>>,
    leaves: RwLock<HashMap<LeaveRequestId, Arc<Mutex<LeaveRequest>>>>,
    audit: Mutex<AuditTrail>,
    next_code: AtomicU64,
}

impl EngineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next human-readable work order code, e.g. "WO-0007"
    pub fn next_work_order_code(&self) -> String {
        let n = self.next_code.fetch_add(1, Ordering::SeqCst) + 1;
        format!("WO-{:04}", n)
    }

    pub fn insert_proposal(&self, proposal: Proposal) -> EngineResult<ProposalId> {
        let id = proposal.id.clone();
        let mut map = self
            .proposals
            .write()
            .map_err(|_| EngineError::Internal("proposal registry poisoned".into()))?;
        map.insert(id.clone(), Arc::new(Mutex::new(proposal)));
        Ok(id)
    }

    pub fn proposal(&self, id: &ProposalId) -> EngineResult<Arc<Mutex<Proposal>>> {
        let map = self
            .proposals
            .read()
            .map_err(|_| EngineError::Internal("proposal registry poisoned".into()))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("proposal {}", id)))
    }

    pub fn insert_work_order(&self, work_order: WorkOrder) -> EngineResult<WorkOrderId> {
        let id = work_order.id.clone();
        let mut map = self
            .work_orders
            .write()
            .map_err(|_| EngineError::Internal("work order registry poisoned".into()))?;
        map.insert(id.clone(), Arc::new(Mutex::new(work_order)));
        Ok(id)
    }

    pub fn work_order(&self, id: &WorkOrderId) -> EngineResult<Arc<Mutex<WorkOrder>>> {
        let map = self
            .work_orders
            .read()
            .map_err(|_| EngineError::Internal("work order registry poisoned".into()))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("work order {}", id)))
    }

    pub fn insert_request(&self, request: Request) -> EngineResult<RequestId> {
        let id = request.id.clone();
        let mut map = self
            .requests
            .write()
            .map_err(|_| EngineError::Internal("request registry poisoned".into()))?;
        map.insert(id.clone(), Arc::new(Mutex::new(request)));
        Ok(id)
    }

    pub fn request(&self, id: &RequestId) -> EngineResult<Arc<Mutex<Request>>> {
        let map = self
            .requests
            .read()
            .map_err(|_| EngineError::Internal("request registry poisoned".into()))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("request {}", id)))
    }

    pub fn remove_request(&self, id: &RequestId) -> EngineResult<()> {
        let mut map = self
            .requests
            .write()
            .map_err(|_| EngineError::Internal("request registry poisoned".into()))?;
        map.remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("request {}", id)))
    }

    pub fn insert_leave(&self, leave: LeaveRequest) -> EngineResult<LeaveRequestId> {
        let id = leave.id.clone();
        let mut map = self
            .leaves
            .write()
            .map_err(|_| EngineError::Internal("leave registry poisoned".into()))?;
        map.insert(id.clone(), Arc::new(Mutex::new(leave)));
        Ok(id)
    }

    pub fn leave(&self, id: &LeaveRequestId) -> EngineResult<Arc<Mutex<LeaveRequest>>> {
        let map = self
            .leaves
            .read()
            .map_err(|_| EngineError::Internal("leave registry poisoned".into()))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("leave request {}", id)))
    }

    pub fn remove_leave(&self, id: &LeaveRequestId) -> EngineResult<()> {
        let mut map = self
            .leaves
            .write()
            .map_err(|_| EngineError::Internal("leave registry poisoned".into()))?;
        map.remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("leave request {}", id)))
    }

    /// Append to the shared audit trail
    pub fn append_audit(&self, entry: AuditEntry) -> EngineResult<()> {
        let mut trail = lock(&self.audit)?;
        trail.append(entry);
        Ok(())
    }

    /// A point-in-time copy of the full audit trail
    pub fn audit_snapshot(&self) -> EngineResult<AuditTrail> {
        let trail = lock(&self.audit)?;
        Ok(trail.clone())
    }

    /// Snapshots of all requests matching the predicate, in no
    /// particular order
    pub fn requests_where<F>(&self, mut pred: F) -> EngineResult<Vec<Request>>
    where
        F: FnMut(&Request) -> bool,
    {
        let map = self
            .requests
            .read()
            .map_err(|_| EngineError::Internal("request registry poisoned".into()))?;
        let cells: Vec<_> = map.values().cloned().collect();
        drop(map);

        let mut out = Vec::new();
        for cell in cells {
            let request = lock(&cell)?;
            if pred(&request) {
                out.push(request.clone());
            }
        }
        Ok(out)
    }

    /// Snapshots of all leave requests matching the predicate
    pub fn leaves_where<F>(&self, mut pred: F) -> EngineResult<Vec<LeaveRequest>>
    where
        F: FnMut(&LeaveRequest) -> bool,
    {
        let map = self
            .leaves
            .read()
            .map_err(|_| EngineError::Internal("leave registry poisoned".into()))?;
        let cells: Vec<_> = map.values().cloned().collect();
        drop(map);

        let mut out = Vec::new();
        for cell in cells {
            let leave = lock(&cell)?;
            if pred(&leave) {
                out.push(leave.clone());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_types::{ActorId, Hours, RequestKind, Role};

    #[test]
    fn test_insert_and_get() {
        let store = EngineStore::new();
        let id = store
            .insert_proposal(Proposal::new("Bridge retrofit", ActorId::new("sam")))
            .unwrap();
        let cell = store.proposal(&id).unwrap();
        assert_eq!(cell.lock().unwrap().title, "Bridge retrofit");
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let store = EngineStore::new();
        let result = store.work_order(&WorkOrderId::new("missing"));
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_codes_are_sequential() {
        let store = EngineStore::new();
        assert_eq!(store.next_work_order_code(), "WO-0001");
        assert_eq!(store.next_work_order_code(), "WO-0002");
    }

    #[test]
    fn test_requests_where_snapshots() {
        let store = EngineStore::new();
        for delta in [5.0, 10.0] {
            store
                .insert_request(Request::new(
                    RequestKind::TimeOverage,
                    WorkOrderId::new("wo-1"),
                    ActorId::new("dana"),
                    Role::Designer,
                    Hours::new(delta),
                    "rework",
                ))
                .unwrap();
        }
        let all = store.requests_where(|_| true).unwrap();
        assert_eq!(all.len(), 2);
        let big = store
            .requests_where(|r| r.delta == Hours::new(10.0))
            .unwrap();
        assert_eq!(big.len(), 1);
    }

    #[test]
    fn test_remove_request() {
        let store = EngineStore::new();
        let id = store
            .insert_request(Request::new(
                RequestKind::Variation,
                WorkOrderId::new("wo-1"),
                ActorId::new("sam"),
                Role::Sales,
                Hours::zero(),
                "scope change",
            ))
            .unwrap();
        store.remove_request(&id).unwrap();
        assert!(matches!(
            store.request(&id),
            Err(EngineError::NotFound(_))
        ));
    }
}
