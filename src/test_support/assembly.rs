//! Writer for small but well-formed managed modules.
//!
//! Emits a PE32 image with one section holding the CLI header and the
//! metadata root. Only type-level tables are populated; method bodies,
//! fields, and custom attributes never appear.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::tables::{self, columns, CodedIndex, Layout, MAX_TABLE};
use crate::scan::module::type_attributes as attrs;

const SECTION_RVA: u32 = 0x2000;
const SECTION_ALIGNMENT: u32 = 0x2000;
const SECTION_OFFSET: usize = 0x200;
const PE_OFFSET: usize = 0x80;
const CLI_HEADER_SIZE: usize = 72;
const FORWARDER: u32 = 0x0020_0000;

/// A type usable in base, interface, or generic-argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHandle {
    Def(u32),
    Ref(u32),
    Spec(u32),
    /// Generic parameter of the enclosing type
    Var(u32),
}

impl TypeHandle {
    pub fn var(index: u32) -> Self {
        TypeHandle::Var(index)
    }

    /// Table row behind the handle.
    pub fn row(&self) -> u32 {
        match *self {
            TypeHandle::Def(r)
            | TypeHandle::Ref(r)
            | TypeHandle::Spec(r)
            | TypeHandle::Var(r) => r,
        }
    }

    fn coded(&self) -> u32 {
        let enc = CodedIndex::TypeDefOrRef;
        match *self {
            TypeHandle::Def(r) => enc.encode(tables::TYPE_DEF, r),
            TypeHandle::Ref(r) => enc.encode(tables::TYPE_REF, r),
            TypeHandle::Spec(r) => enc.encode(tables::TYPE_SPEC, r),
            TypeHandle::Var(_) => panic!("generic parameters have no token"),
        }
    }
}

#[derive(Debug, Clone)]
struct TypeDefEntry {
    flags: u32,
    namespace: String,
    name: String,
    extends: Option<TypeHandle>,
}

/// Builds one managed module in memory.
#[derive(Debug, Clone)]
pub struct AssemblyBuilder {
    name: String,
    assembly_refs: Vec<String>,
    type_refs: Vec<(u32, String, String)>,
    type_defs: Vec<TypeDefEntry>,
    type_specs: Vec<Vec<u8>>,
    interface_impls: Vec<(u32, TypeHandle)>,
    nested: Vec<(u32, u32)>,
    exported: Vec<(String, String, u32)>,
}

impl AssemblyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        AssemblyBuilder {
            name: name.into(),
            assembly_refs: Vec::new(),
            type_refs: Vec::new(),
            type_defs: vec![TypeDefEntry {
                flags: 0,
                namespace: String::new(),
                name: "<Module>".to_string(),
                extends: None,
            }],
            type_specs: Vec::new(),
            interface_impls: Vec::new(),
            nested: Vec::new(),
            exported: Vec::new(),
        }
    }

    fn assembly_ref(&mut self, assembly: &str) -> u32 {
        if let Some(i) = self.assembly_refs.iter().position(|a| a == assembly) {
            return i as u32 + 1;
        }
        self.assembly_refs.push(assembly.to_string());
        self.assembly_refs.len() as u32
    }

    /// Reference a type defined in another assembly.
    pub fn type_ref(&mut self, assembly: &str, namespace: &str, name: &str) -> TypeHandle {
        let assembly = self.assembly_ref(assembly);
        let scope = CodedIndex::ResolutionScope.encode(tables::ASSEMBLY_REF, assembly);
        self.type_refs
            .push((scope, namespace.to_string(), name.to_string()));
        TypeHandle::Ref(self.type_refs.len() as u32)
    }

    /// Define a type with explicit attribute flags.
    pub fn define(
        &mut self,
        namespace: &str,
        name: &str,
        flags: u32,
        extends: Option<TypeHandle>,
    ) -> TypeHandle {
        self.type_defs.push(TypeDefEntry {
            flags,
            namespace: namespace.to_string(),
            name: name.to_string(),
            extends,
        });
        TypeHandle::Def(self.type_defs.len() as u32)
    }

    /// Public concrete class.
    pub fn class(
        &mut self,
        namespace: &str,
        name: &str,
        extends: Option<TypeHandle>,
    ) -> TypeHandle {
        self.define(namespace, name, attrs::PUBLIC, extends)
    }

    /// Public interface.
    pub fn interface(&mut self, namespace: &str, name: &str) -> TypeHandle {
        self.define(
            namespace,
            name,
            attrs::PUBLIC | attrs::INTERFACE | attrs::ABSTRACT,
            None,
        )
    }

    pub fn implement(&mut self, ty: TypeHandle, interface: TypeHandle) {
        self.interface_impls.push((ty.row(), interface));
    }

    pub fn nest(&mut self, inner: TypeHandle, outer: TypeHandle) {
        self.nested.push((inner.row(), outer.row()));
    }

    /// `base<args...>` as a `TypeSpec`.
    pub fn generic_instance(&mut self, base: TypeHandle, args: &[TypeHandle]) -> TypeHandle {
        let mut sig = vec![0x15, 0x12];
        compressed(&mut sig, base.coded());
        compressed(&mut sig, args.len() as u32);
        for arg in args {
            self.encode_arg(&mut sig, *arg);
        }
        self.type_specs.push(sig);
        TypeHandle::Spec(self.type_specs.len() as u32)
    }

    fn encode_arg(&self, sig: &mut Vec<u8>, arg: TypeHandle) {
        match arg {
            TypeHandle::Def(_) | TypeHandle::Ref(_) => {
                sig.push(0x12);
                compressed(sig, arg.coded());
            }
            TypeHandle::Spec(row) => sig.extend_from_slice(&self.type_specs[row as usize - 1]),
            TypeHandle::Var(n) => {
                sig.push(0x13);
                compressed(sig, n);
            }
        }
    }

    /// Forward `namespace.name` to another assembly.
    pub fn forward(&mut self, assembly: &str, namespace: &str, name: &str) {
        let assembly = self.assembly_ref(assembly);
        let target = CodedIndex::Implementation.encode(tables::ASSEMBLY_REF, assembly);
        self.exported
            .push((namespace.to_string(), name.to_string(), target));
    }

    /// Write `<dir>/<name>.dll` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}.dll", self.name));
        std::fs::write(&path, self.to_bytes()).expect("write assembly");
        path
    }

    /// The complete PE image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let metadata = self.metadata_root();

        let mut section = Vec::new();
        put_u32(&mut section, CLI_HEADER_SIZE as u32);
        put_u16(&mut section, 2);
        put_u16(&mut section, 5);
        put_u32(&mut section, SECTION_RVA + CLI_HEADER_SIZE as u32);
        put_u32(&mut section, metadata.len() as u32);
        put_u32(&mut section, 1); // IL only
        section.resize(CLI_HEADER_SIZE, 0);
        section.extend_from_slice(&metadata);
        let virtual_size = section.len() as u32;
        section.resize(section.len().next_multiple_of(0x200), 0);

        let mut image = vec![0u8; SECTION_OFFSET];
        image[0..2].copy_from_slice(b"MZ");
        write_u32(&mut image, 0x3C, PE_OFFSET as u32);
        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let coff = PE_OFFSET + 4;
        write_u16(&mut image, coff, 0x14C);
        write_u16(&mut image, coff + 2, 1);
        write_u16(&mut image, coff + 16, 224);
        write_u16(&mut image, coff + 18, 0x2102);

        let optional = coff + 20;
        write_u16(&mut image, optional, 0x10B);
        write_u32(&mut image, optional + 28, 0x0040_0000);
        write_u32(&mut image, optional + 32, SECTION_ALIGNMENT);
        write_u32(&mut image, optional + 36, SECTION_OFFSET as u32);
        write_u16(&mut image, optional + 40, 4);
        write_u16(&mut image, optional + 48, 4);
        let image_size = SECTION_RVA + virtual_size.next_multiple_of(SECTION_ALIGNMENT);
        write_u32(&mut image, optional + 56, image_size);
        write_u32(&mut image, optional + 60, SECTION_OFFSET as u32);
        write_u16(&mut image, optional + 68, 3);
        write_u32(&mut image, optional + 92, 16);
        let cli_directory = optional + 96 + 14 * 8;
        write_u32(&mut image, cli_directory, SECTION_RVA);
        write_u32(&mut image, cli_directory + 4, CLI_HEADER_SIZE as u32);

        let header = optional + 224;
        image[header..header + 5].copy_from_slice(b".text");
        write_u32(&mut image, header + 8, virtual_size);
        write_u32(&mut image, header + 12, SECTION_RVA);
        write_u32(&mut image, header + 16, section.len() as u32);
        write_u32(&mut image, header + 20, SECTION_OFFSET as u32);
        write_u32(&mut image, header + 36, 0x6000_0020);

        image.extend_from_slice(&section);
        image
    }

    fn metadata_root(&self) -> Vec<u8> {
        let mut strings = StringHeap::default();
        let mut blobs = vec![0u8];
        let mut rows: Vec<Vec<Vec<u32>>> = vec![Vec::new(); MAX_TABLE as usize + 1];

        let module_name = strings.add(&format!("{}.dll", self.name));
        rows[tables::MODULE as usize].push(vec![0, module_name, 1, 0, 0]);
        for (scope, namespace, name) in &self.type_refs {
            let row = vec![*scope, strings.add(name), strings.add(namespace)];
            rows[tables::TYPE_REF as usize].push(row);
        }
        for def in &self.type_defs {
            let extends = def.extends.map_or(0, |h| h.coded());
            rows[tables::TYPE_DEF as usize].push(vec![
                def.flags,
                strings.add(&def.name),
                strings.add(&def.namespace),
                extends,
                1,
                1,
            ]);
        }
        for (class, interface) in &self.interface_impls {
            rows[tables::INTERFACE_IMPL as usize].push(vec![*class, interface.coded()]);
        }
        for sig in &self.type_specs {
            let offset = blobs.len() as u32;
            compressed(&mut blobs, sig.len() as u32);
            blobs.extend_from_slice(sig);
            rows[tables::TYPE_SPEC as usize].push(vec![offset]);
        }
        let assembly_name = strings.add(&self.name);
        rows[tables::ASSEMBLY as usize].push(vec![0x8004, 1, 0, 0, 0, 0, 0, assembly_name, 0]);
        for name in &self.assembly_refs {
            let row = vec![1, 0, 0, 0, 0, 0, strings.add(name), 0, 0];
            rows[tables::ASSEMBLY_REF as usize].push(row);
        }
        for (namespace, name, target) in &self.exported {
            rows[tables::EXPORTED_TYPE as usize].push(vec![
                FORWARDER,
                0,
                strings.add(name),
                strings.add(namespace),
                *target,
            ]);
        }
        for (inner, outer) in &self.nested {
            rows[tables::NESTED_CLASS as usize].push(vec![*inner, *outer]);
        }

        let table_stream = table_stream(&rows);
        let mut string_heap = strings.bytes;
        pad4(&mut string_heap);
        pad4(&mut blobs);
        let guid_heap = vec![0x42u8; 16];

        let streams: [(&str, &[u8]); 4] = [
            ("#~", &table_stream),
            ("#Strings", &string_heap),
            ("#Blob", &blobs),
            ("#GUID", &guid_heap),
        ];

        let version = b"v4.0.30319\0\0";
        let headers_len: usize = streams
            .iter()
            .map(|(name, _)| 8 + (name.len() + 4) / 4 * 4)
            .sum();

        let mut root = Vec::new();
        put_u32(&mut root, 0x424A_5342);
        put_u16(&mut root, 1);
        put_u16(&mut root, 1);
        put_u32(&mut root, 0);
        put_u32(&mut root, version.len() as u32);
        root.extend_from_slice(version);
        put_u16(&mut root, 0);
        put_u16(&mut root, streams.len() as u16);

        let mut offset = root.len() + headers_len;
        for (name, data) in &streams {
            put_u32(&mut root, offset as u32);
            put_u32(&mut root, data.len() as u32);
            let mut padded = name.as_bytes().to_vec();
            padded.resize((name.len() + 4) / 4 * 4, 0);
            root.extend_from_slice(&padded);
            offset += data.len();
        }
        for (_, data) in &streams {
            root.extend_from_slice(data);
        }
        root
    }
}

fn table_stream(rows: &[Vec<Vec<u32>>]) -> Vec<u8> {
    let mut counts = [0u32; MAX_TABLE as usize + 1];
    for (table, table_rows) in rows.iter().enumerate() {
        counts[table] = table_rows.len() as u32;
    }
    let layout = Layout { rows: counts };
    let valid = counts
        .iter()
        .enumerate()
        .filter(|(_, n)| **n > 0)
        .fold(0u64, |mask, (table, _)| mask | (1 << table));

    let mut out = Vec::new();
    put_u32(&mut out, 0);
    out.extend_from_slice(&[2, 0, 0, 1]);
    out.extend_from_slice(&valid.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    for count in counts.iter().filter(|n| **n > 0) {
        put_u32(&mut out, *count);
    }

    for (table, table_rows) in rows.iter().enumerate() {
        let cols = columns(table as u8);
        for row in table_rows {
            for (col, value) in cols.iter().zip(row) {
                match layout.width(*col) {
                    2 => put_u16(&mut out, *value as u16),
                    _ => put_u32(&mut out, *value),
                }
            }
        }
    }
    pad4(&mut out);
    out
}

#[derive(Default)]
struct StringHeap {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringHeap {
    fn add(&mut self, s: &str) -> u32 {
        if self.bytes.is_empty() {
            self.bytes.push(0);
        }
        if s.is_empty() {
            return 0;
        }
        if let Some(offset) = self.offsets.get(s) {
            return *offset;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }
}

fn compressed(out: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.extend_from_slice(&(0x8000 | value as u16).to_be_bytes());
    } else {
        out.extend_from_slice(&(0xC000_0000 | value).to_be_bytes());
    }
}

fn pad4(buf: &mut Vec<u8>) {
    buf.resize(buf.len().next_multiple_of(4), 0);
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
