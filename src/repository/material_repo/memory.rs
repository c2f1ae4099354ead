use crate::domain::material::Material;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_repo::MaterialStore;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

// ==========================================
// InMemoryMaterialStore - 内存物料存储
// ==========================================
/// 测试与临时账本使用,不落盘
#[derive(Debug, Default)]
pub struct InMemoryMaterialStore {
    materials: Mutex<BTreeMap<String, Material>>,
}

impl InMemoryMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> RepositoryResult<MutexGuard<'_, BTreeMap<String, Material>>> {
        self.materials
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl MaterialStore for InMemoryMaterialStore {
    fn load_all(&self) -> RepositoryResult<Vec<Material>> {
        Ok(self.guard()?.values().cloned().collect())
    }

    fn save_material(&self, material: &Material) -> RepositoryResult<()> {
        self.guard()?
            .insert(material.name.clone(), material.clone());
        Ok(())
    }

    fn save_all(&self, materials: &[Material]) -> RepositoryResult<()> {
        let mut guard = self.guard()?;
        guard.clear();
        for m in materials {
            guard.insert(m.name.clone(), m.clone());
        }
        Ok(())
    }

    fn delete_material(&self, name: &str) -> RepositoryResult<bool> {
        Ok(self.guard()?.remove(name).is_some())
    }
}
