//! The process-wide type-info cache.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use super::tag::parse_tag;
use super::{
    FieldInfo, HostType, MapInfo, RecordInfo, Schema, SliceInfo, TypeError, TypeInfo,
};
use crate::value::ValueKind;

static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<TypeInfo>>>> = OnceLock::new();

/// Returns the validated [`TypeInfo`] for a host value's type.
///
/// Results are memoized by type identity. Concurrent callers racing on the
/// same type may build the info more than once but all converge on the entry
/// that lands in the cache first.
///
/// # Errors
///
/// Returns a [`TypeError`] when the type's schema is malformed; errors are
/// not cached.
pub fn info_for(sample: &dyn HostType) -> Result<Arc<TypeInfo>, TypeError> {
    let type_id = sample.as_any().type_id();
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    if let Some(info) = cache
        .read()
        .expect("type info cache poisoned")
        .get(&type_id)
    {
        return Ok(Arc::clone(info));
    }

    let built = Arc::new(build_info(type_id, sample.schema())?);
    debug!(type_name = built.type_name(), "constructed type info");

    let mut cache = cache.write().expect("type info cache poisoned");
    Ok(Arc::clone(cache.entry(type_id).or_insert(built)))
}

fn build_info(type_id: TypeId, schema: &'static Schema) -> Result<TypeInfo, TypeError> {
    match schema {
        Schema::Record(rs) => {
            let mut fields = Vec::with_capacity(rs.fields.len());
            for raw in rs.fields {
                let parsed = parse_tag(raw.tag).map_err(|source| TypeError::Tag {
                    path: raw.path.to_string(),
                    source,
                })?;
                fields.push(FieldInfo {
                    tag: parsed.name,
                    path: raw.path,
                    kind: raw.kind,
                    omit_empty: parsed.omit_empty,
                    get: raw.get,
                    set: raw.set,
                });
            }
            // Tag order drives star expansion, so fix it here.
            fields.sort_by(|a, b| a.tag.cmp(&b.tag));
            let mut by_tag = HashMap::with_capacity(fields.len());
            for (i, field) in fields.iter().enumerate() {
                if by_tag.insert(field.tag.clone(), i).is_some() {
                    return Err(TypeError::DuplicateTag {
                        type_name: rs.type_name.to_string(),
                        tag: field.tag.clone(),
                    });
                }
            }
            Ok(TypeInfo::Record(RecordInfo {
                type_name: rs.type_name,
                module_path: rs.module_path,
                type_id,
                fields,
                by_tag,
            }))
        }
        Schema::Map(ms) => {
            if ms.key_kind != ValueKind::Text {
                return Err(TypeError::UnsupportedKeyType {
                    type_name: ms.type_name.to_string(),
                    kind: ms.key_kind,
                });
            }
            Ok(TypeInfo::Map(MapInfo {
                type_name: ms.type_name,
                module_path: ms.module_path,
                type_id,
                get: ms.get,
                insert: ms.insert,
            }))
        }
        Schema::Slice(ss) => Ok(TypeInfo::Slice(SliceInfo {
            type_name: ss.type_name,
            module_path: ss.module_path,
            type_id,
            elem_kind: ss.elem_kind,
            elements: ss.elements,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeinfo::ValueMap;

    #[test]
    fn test_info_for_map() {
        let info = info_for(&ValueMap::new()).unwrap();
        assert_eq!(info.type_name(), "ValueMap");
        assert!(matches!(&*info, TypeInfo::Map(_)));
    }

    #[test]
    fn test_info_for_is_cached() {
        let a = info_for(&ValueMap::new()).unwrap();
        let b = info_for(&ValueMap::new()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_info_for_concurrent_callers_converge() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| info_for(&ValueMap::new()).unwrap()))
            .collect();
        let infos: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for info in &infos {
            assert!(Arc::ptr_eq(info, &infos[0]));
        }
    }
}
